//! OpenAPI document generation.
//!
//! The document is built once when the application is assembled, from the
//! OpenAPI configuration and every route marked `include_in_schema`.

use std::sync::OnceLock;

use indexmap::IndexMap;
use peridot_config::{Contact, License, OpenApiConfig, ServerInfo};
use peridot_router::{RouteEntry, RouteTable};
use regex::Regex;
use serde::Serialize;

/// An OpenAPI document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenApi {
    /// Specification version.
    pub openapi: String,
    /// API metadata.
    pub info: Info,
    /// Servers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerInfo>,
    /// Operations by path template, then by lowercase method.
    pub paths: IndexMap<String, IndexMap<String, Operation>>,
    /// Document-level tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

/// API metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Info {
    /// Title.
    pub title: String,
    /// API version.
    pub version: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Terms of service URL.
    #[serde(rename = "termsOfService", skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    /// Contact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    /// License.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

/// A named tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
}

/// One method on one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    /// Unique operation id.
    #[serde(rename = "operationId")]
    pub operation_id: String,
    /// Summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Path parameters.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Responses by status code.
    pub responses: IndexMap<String, ResponseDoc>,
}

/// A path parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Name.
    pub name: String,
    /// Always `path`.
    #[serde(rename = "in")]
    pub location: &'static str,
    /// Always `true` for path parameters.
    pub required: bool,
    /// JSON schema of the value.
    pub schema: serde_json::Value,
}

/// A documented response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseDoc {
    /// Description.
    pub description: String,
}

fn param_regex() -> &'static Regex {
    static PARAM: OnceLock<Regex> = OnceLock::new();
    PARAM.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)(?::([a-z]+))?\}").expect("valid regex")
    })
}

impl OpenApi {
    /// Builds the document for `routes`.
    pub fn build(config: &OpenApiConfig, routes: &RouteTable) -> Self {
        let mut paths: IndexMap<String, IndexMap<String, Operation>> = IndexMap::new();

        for entry in routes.iter().filter(|entry| entry.include_in_schema()) {
            let (template, parameters) = openapi_path(entry.path());
            let item = paths.entry(template).or_default();
            for method in entry.methods() {
                let method = method.as_str().to_ascii_lowercase();
                let operation = Operation {
                    operation_id: operation_id(entry, &method),
                    summary: entry.summary().map(str::to_string),
                    description: entry.description().map(str::to_string),
                    tags: entry.tags().to_vec(),
                    parameters: parameters.clone(),
                    responses: IndexMap::from([(
                        "200".to_string(),
                        ResponseDoc {
                            description: "Successful Response".to_string(),
                        },
                    )]),
                };
                item.insert(method, operation);
            }
        }

        Self {
            openapi: config.openapi_version.clone(),
            info: Info {
                title: config.title.clone(),
                version: config.version.clone(),
                description: config.description.clone(),
                terms_of_service: config.terms_of_service.clone(),
                contact: config.contact.clone(),
                license: config.license.clone(),
            },
            servers: config.servers.clone(),
            paths,
            tags: config
                .tags
                .iter()
                .map(|name| Tag { name: name.clone() })
                .collect(),
        }
    }
}

/// Rewrites `{id:int}` to `{id}` and collects the parameters.
fn openapi_path(template: &str) -> (String, Vec<Parameter>) {
    let regex = param_regex();
    let parameters = regex
        .captures_iter(template)
        .map(|caps| {
            let kind = match caps.get(2).map(|m| m.as_str()) {
                Some("int") => "integer",
                _ => "string",
            };
            Parameter {
                name: caps[1].to_string(),
                location: "path",
                required: true,
                schema: serde_json::json!({ "type": kind }),
            }
        })
        .collect();
    let path = regex.replace_all(template, "{$1}").into_owned();
    (path, parameters)
}

fn operation_id(entry: &RouteEntry, method: &str) -> String {
    match entry.name() {
        Some(name) => format!("{}_{method}", name.replace(':', "_")),
        None => {
            let slug: Vec<&str> = entry
                .path()
                .split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|part| !part.is_empty())
                .collect();
            format!("{}_{method}", slug.join("_"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peridot_config::Settings;
    use peridot_core::{responses, Handler};
    use peridot_router::{Gateway, Include, Route};

    fn handler() -> Handler {
        Handler::new(|_| async { responses::text("ok") })
    }

    fn table() -> RouteTable {
        RouteTable::from_routes(vec![
            Route::from(Gateway::get("/health", handler()).include_in_schema(false)),
            Route::from(Include::new(
                "/users",
                vec![
                    Gateway::get("/{id:int}", handler())
                        .name("detail")
                        .summary("Fetch a user")
                        .tags(["users"])
                        .into(),
                    Gateway::delete("/{id:int}", handler()).into(),
                    Gateway::get("/files/{rest:path}", handler()).into(),
                ],
            )
            .name("users")),
        ])
        .unwrap()
    }

    #[test]
    fn test_path_rewriting() {
        let (path, params) = openapi_path("/users/{id:int}/posts/{slug}");
        assert_eq!(path, "/users/{id}/posts/{slug}");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].schema, serde_json::json!({"type": "integer"}));
        assert_eq!(params[1].schema, serde_json::json!({"type": "string"}));
    }

    #[test]
    fn test_document_from_routes() {
        let config = Settings::default().openapi_config().unwrap();
        let doc = OpenApi::build(&config, &table());

        assert_eq!(doc.openapi, "3.1.0");
        assert_eq!(doc.info.title, "My awesome Peridot application");
        assert!(!doc.paths.contains_key("/health"));

        let user = &doc.paths["/users/{id}"];
        assert_eq!(user["get"].operation_id, "users_detail_get");
        assert_eq!(user["get"].summary.as_deref(), Some("Fetch a user"));
        assert_eq!(user["get"].tags, vec!["users"]);
        assert_eq!(user["delete"].operation_id, "users_id_int_delete");
        assert!(doc.paths.contains_key("/users/files/{rest}"));
    }

    #[test]
    fn test_operation_ids_are_unique() {
        let config = Settings::default().openapi_config().unwrap();
        let doc = OpenApi::build(&config, &table());

        let mut ids: Vec<&str> = doc
            .paths
            .values()
            .flat_map(|operations| operations.values())
            .map(|operation| operation.operation_id.as_str())
            .collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert_eq!(
            doc.paths["/users/files/{rest}"]["get"].operation_id,
            "users_files_rest_path_get"
        );
    }

    #[test]
    fn test_serialized_shape() {
        let config = Settings::default().openapi_config().unwrap();
        let json = serde_json::to_value(OpenApi::build(&config, &table())).unwrap();
        assert_eq!(json["info"]["contact"]["email"], "admin@myapp.com");
        assert_eq!(
            json["paths"]["/users/{id}"]["get"]["parameters"][0]["in"],
            "path"
        );
        assert_eq!(
            json["paths"]["/users/{id}"]["get"]["responses"]["200"]["description"],
            "Successful Response"
        );
    }
}
