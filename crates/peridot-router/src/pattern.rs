//! Path templates.
//!
//! A template is a `/`-separated list of segments. Each segment is a
//! literal, `{name}` (one segment), `{name:int}` (one segment of digits)
//! or `{name:path}` (the rest of the path, only allowed last).

use std::fmt;

use indexmap::IndexMap;

use crate::RouteError;

/// One segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matches the text exactly.
    Literal(String),
    /// Matches any single non-empty segment.
    Param(String),
    /// Matches a single segment made of ASCII digits.
    Int(String),
    /// Matches the remainder of the path.
    CatchAll(String),
}

impl Segment {
    /// Captured parameter name, if this segment captures.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Param(name) | Self::Int(name) | Self::CatchAll(name) => Some(name),
        }
    }

    fn shape(&self) -> &str {
        match self {
            Self::Literal(text) => text,
            Self::Param(_) => "{}",
            Self::Int(_) => "{:int}",
            Self::CatchAll(_) => "{:path}",
        }
    }
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    template: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parses a template such as `/users/{id}/files/{rest:path}`.
    pub fn parse(template: &str) -> Result<Self, RouteError> {
        if !template.starts_with('/') {
            return Err(RouteError::invalid_path(template, "must start with `/`"));
        }

        let mut segments = Vec::new();
        let mut names: Vec<String> = Vec::new();
        let raw: Vec<&str> = split(template).collect();

        for (index, part) in raw.iter().enumerate() {
            let segment = parse_segment(template, part)?;
            if let Some(name) = segment.param_name() {
                if names.iter().any(|seen| seen == name) {
                    return Err(RouteError::invalid_path(
                        template,
                        format!("parameter `{name}` appears twice"),
                    ));
                }
                names.push(name.to_string());
            }
            if matches!(segment, Segment::CatchAll(_)) && index + 1 != raw.len() {
                return Err(RouteError::invalid_path(
                    template,
                    "a `path` parameter must be the last segment",
                ));
            }
            segments.push(segment);
        }

        Ok(Self {
            template: normalize(template),
            segments,
        })
    }

    /// The normalised template text.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of the captured parameters, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::param_name)
    }

    /// Template with parameter names erased; equal shapes match the same paths.
    pub fn shape(&self) -> String {
        let mut shape = String::new();
        for segment in &self.segments {
            shape.push('/');
            shape.push_str(segment.shape());
        }
        if shape.is_empty() {
            shape.push('/');
        }
        shape
    }

    /// Matches a request path, returning the captured parameters.
    pub fn matches(&self, path: &str) -> Option<IndexMap<String, String>> {
        let parts: Vec<&str> = split(path).collect();
        let mut params = IndexMap::new();

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::CatchAll(name) => {
                    params.insert(name.clone(), parts.get(index..).unwrap_or(&[]).join("/"));
                    return Some(params);
                }
                Segment::Literal(text) => {
                    if parts.get(index) != Some(&text.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(index)?;
                    params.insert(name.clone(), (*value).to_string());
                }
                Segment::Int(name) => {
                    let value = parts.get(index)?;
                    if !value.bytes().all(|b| b.is_ascii_digit()) {
                        return None;
                    }
                    params.insert(name.clone(), (*value).to_string());
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

fn normalize(path: &str) -> String {
    let joined = split(path).collect::<Vec<_>>().join("/");
    format!("/{joined}")
}

fn parse_segment(template: &str, part: &str) -> Result<Segment, RouteError> {
    let opens = part.matches('{').count();
    let closes = part.matches('}').count();

    if opens == 0 && closes == 0 {
        return Ok(Segment::Literal(part.to_string()));
    }
    if opens != 1 || closes != 1 || !part.starts_with('{') || !part.ends_with('}') {
        return Err(RouteError::invalid_path(
            template,
            format!("segment `{part}` must be a literal or a single `{{name}}`"),
        ));
    }

    let inner = &part[1..part.len() - 1];
    let (name, converter) = match inner.split_once(':') {
        Some((name, converter)) => (name, Some(converter)),
        None => (inner, None),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RouteError::invalid_path(
            template,
            format!("invalid parameter name `{name}`"),
        ));
    }

    match converter {
        None | Some("str") => Ok(Segment::Param(name.to_string())),
        Some("int") => Ok(Segment::Int(name.to_string())),
        Some("path") => Ok(Segment::CatchAll(name.to_string())),
        Some(other) => Err(RouteError::invalid_path(
            template,
            format!("unknown converter `{other}`"),
        )),
    }
}

/// Joins a prefix and a path into a normalised template.
///
/// ```rust
/// use peridot_router::join_paths;
///
/// assert_eq!(join_paths("/api/", "/users"), "/api/users");
/// assert_eq!(join_paths("/", "/"), "/");
/// assert_eq!(join_paths("/api", "/"), "/api");
/// ```
pub fn join_paths(prefix: &str, path: &str) -> String {
    normalize(&format!("{prefix}/{path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal_and_params() {
        let pattern = PathPattern::parse("/users/{id}/posts/{post_id:int}").unwrap();
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Literal("users".into()),
                Segment::Param("id".into()),
                Segment::Literal("posts".into()),
                Segment::Int("post_id".into()),
            ]
        );
        assert_eq!(pattern.param_names().collect::<Vec<_>>(), vec!["id", "post_id"]);
    }

    #[test]
    fn test_parse_rejects_bad_templates() {
        assert!(PathPattern::parse("users").is_err());
        assert!(PathPattern::parse("/users/{id").is_err());
        assert!(PathPattern::parse("/users/{}").is_err());
        assert!(PathPattern::parse("/users/{id:uuid}").is_err());
        assert!(PathPattern::parse("/files/{rest:path}/tail").is_err());
        assert!(PathPattern::parse("/a/{id}/b/{id}").is_err());
        assert!(PathPattern::parse("/a/x{id}").is_err());
    }

    #[test]
    fn test_match_params() {
        let pattern = PathPattern::parse("/users/{id}").unwrap();
        let params = pattern.matches("/users/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert!(pattern.matches("/users").is_none());
        assert!(pattern.matches("/users/42/extra").is_none());
    }

    #[test]
    fn test_match_ignores_trailing_slash() {
        let pattern = PathPattern::parse("/users").unwrap();
        assert!(pattern.matches("/users/").is_some());
    }

    #[test]
    fn test_match_int_converter() {
        let pattern = PathPattern::parse("/items/{n:int}").unwrap();
        assert!(pattern.matches("/items/12").is_some());
        assert!(pattern.matches("/items/twelve").is_none());
    }

    #[test]
    fn test_match_catch_all() {
        let pattern = PathPattern::parse("/static/{file:path}").unwrap();
        let params = pattern.matches("/static/css/site.css").unwrap();
        assert_eq!(params["file"], "css/site.css");
    }

    #[test]
    fn test_root_pattern() {
        let pattern = PathPattern::parse("/").unwrap();
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/x").is_none());
        assert_eq!(pattern.shape(), "/");
    }

    #[test]
    fn test_shape_ignores_param_names() {
        let a = PathPattern::parse("/users/{id}").unwrap();
        let b = PathPattern::parse("/users/{user_id}").unwrap();
        assert_eq!(a.shape(), b.shape());
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/api", "/v1/users/"), "/api/v1/users");
        assert_eq!(join_paths("", "users"), "/users");
        assert_eq!(join_paths("/api//", "//items"), "/api/items");
    }
}
