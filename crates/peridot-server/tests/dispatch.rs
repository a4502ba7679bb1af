//! Request dispatch through an assembled application.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE, HOST};
use http::{Method, StatusCode};
use peridot_config::{ConfigError, Secret, SessionConfig, Settings, SettingsOverrides};
use peridot_core::{
    responses, Dependencies, DenyAll, ExceptionHandler, Handler, Inject, Lifespan,
    LifespanFactory, LifespanHook, LifecycleResult, PathParams, Request,
};
use peridot_extract::{FormData, TargetField};
use peridot_router::{Gateway, Include, Route};
use peridot_server::{Application, ServerError};

fn get(uri: &str) -> Request {
    http::Request::builder()
        .uri(uri)
        .header(HOST, "localhost")
        .body(Bytes::new())
        .unwrap()
}

fn ok() -> Handler {
    Handler::new(|_| async { responses::text("ok") })
}

fn echo_id() -> Handler {
    Handler::new(|request: Request| async move {
        let id = request
            .extensions()
            .get::<PathParams>()
            .and_then(|params| params.get("id"))
            .unwrap_or("missing")
            .to_string();
        responses::text(id)
    })
}

fn app(settings: Settings, routes: Vec<Route>) -> Application {
    Application::builder(settings).routes(routes).build().unwrap()
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let app = app(Settings::default(), vec![Gateway::get("/items", ok()).into()]);
    let response = app.handle(get("/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.body().as_ref(), br#"{"detail":"Not Found"}"#);
}

#[tokio::test]
async fn test_wrong_method_is_405_with_allow() {
    let app = app(Settings::default(), vec![Gateway::get("/items", ok()).into()]);
    let mut request = get("/items");
    *request.method_mut() = Method::POST;

    let response = app.handle(request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[ALLOW], "GET, HEAD");
}

#[tokio::test]
async fn test_path_params_reach_handler() {
    let app = app(
        Settings::default(),
        vec![Include::new("/users", vec![Gateway::get("/{id:int}", echo_id()).into()]).into()],
    );
    let response = app.handle(get("/users/42")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body().as_ref(), b"42");

    let response = app.handle(get("/users/abc")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_denied_permission_skips_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handler = Handler::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { responses::text("secret") }
    });

    let app = app(
        Settings::default(),
        vec![Include::new("/admin", vec![Gateway::get("/", handler).into()])
            .permission(Arc::new(DenyAll))
            .into()],
    );
    let response = app.handle(get("/admin")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dependencies_reach_handler() {
    let handler = Handler::new(|request: Request| async move {
        let greeting = request
            .extensions()
            .get::<Arc<Dependencies>>()
            .and_then(|deps| deps.resolve::<String>("greeting").ok())
            .map_or_else(|| "none".to_string(), |g| g.as_ref().clone());
        responses::text(greeting)
    });

    let app = Application::builder(Settings::default())
        .route(Gateway::get("/hello", handler))
        .dependency("greeting", Inject::value("hi there".to_string()))
        .build()
        .unwrap();

    let response = app.handle(get("/hello")).await;
    assert_eq!(response.body().as_ref(), b"hi there");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = app(
        Settings::default(),
        vec![Gateway::get("/items/{id}", ok()).name("item").into()],
    );
    let response = app.handle(get("/docs/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], responses::APPLICATION_JSON);

    let doc: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(doc["openapi"], "3.1.0");
    assert_eq!(doc["paths"]["/items/{id}"]["get"]["operationId"], "item_get");
}

#[tokio::test]
async fn test_openapi_disabled_by_settings() {
    let settings = Settings {
        include_in_schema: false,
        ..Settings::default()
    };
    let app = app(settings, vec![Gateway::get("/items", ok()).into()]);
    assert!(app.openapi().is_none());
    let response = app.handle(get("/docs/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_allowed_hosts() {
    let settings = Settings {
        allowed_hosts: vec!["example.com".into(), "*.example.org".into()],
        ..Settings::default()
    };
    let app = app(settings, vec![Gateway::get("/", ok()).into()]);

    let with_host = |host: &str| {
        http::Request::builder()
            .uri("/")
            .header(HOST, host)
            .body(Bytes::new())
            .unwrap()
    };
    assert_eq!(app.handle(with_host("example.com:8000")).await.status(), StatusCode::OK);
    assert_eq!(app.handle(with_host("api.example.org")).await.status(), StatusCode::OK);
    assert_eq!(
        app.handle(with_host("example.org")).await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        app.handle(with_host("evil.test")).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_allowed_hosts_ignore_case() {
    let settings = Settings {
        allowed_hosts: vec!["Example.com".into(), "*.example.ORG".into()],
        ..Settings::default()
    };
    let app = app(settings, vec![Gateway::get("/", ok()).into()]);

    let with_host = |host: &str| {
        http::Request::builder()
            .uri("/")
            .header(HOST, host)
            .body(Bytes::new())
            .unwrap()
    };
    assert_eq!(app.handle(with_host("EXAMPLE.COM")).await.status(), StatusCode::OK);
    assert_eq!(app.handle(with_host("API.Example.org:443")).await.status(), StatusCode::OK);
    assert_eq!(
        app.handle(with_host("Example.org")).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_root_path_is_stripped() {
    let settings = Settings {
        root_path: "/api".into(),
        ..Settings::default()
    };
    let app = app(settings, vec![Gateway::get("/items", ok()).into()]);
    assert_eq!(app.handle(get("/api/items")).await.status(), StatusCode::OK);
    assert_eq!(app.handle(get("/items")).await.status(), StatusCode::OK);
    assert_eq!(app.handle(get("/apiitems")).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_exception_handler_rewrites_status() {
    let app = Application::builder(Settings::default())
        .exception_handler(
            StatusCode::NOT_FOUND,
            ExceptionHandler::new(|_| {
                responses::with_body(StatusCode::NOT_FOUND, responses::TEXT_PLAIN, "custom 404")
            }),
        )
        .build()
        .unwrap();
    let response = app.handle(get("/missing")).await;
    assert_eq!(response.body().as_ref(), b"custom 404");
}

#[tokio::test]
async fn test_cors_preflight_answered_before_routing() {
    let settings = Settings {
        allow_origins: Some(vec!["https://app.example".into()]),
        ..Settings::default()
    };
    let app = app(settings, vec![Gateway::post("/items", ok()).into()]);
    let request = http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/items")
        .header(HOST, "localhost")
        .header("origin", "https://app.example")
        .header("access-control-request-method", "POST")
        .body(Bytes::new())
        .unwrap();

    let response = app.handle(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://app.example"
    );
}

#[tokio::test]
async fn test_panicking_handler_reports_in_debug_only() {
    let boom = Handler::new(|_| async {
        if true {
            panic!("kaboom");
        }
        responses::text("unreachable")
    });
    let app = app(Settings::default(), vec![Gateway::get("/boom", boom).into()]);

    let response = app.handle(get("/boom")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body().as_ref(),
        br#"{"detail":"Internal Server Error"}"#
    );

    app.set_debug(true);
    let response = app.handle(get("/boom")).await;
    assert_eq!(response.body().as_ref(), br#"{"detail":"kaboom"}"#);
}

#[tokio::test]
async fn test_form_handler() {
    let handler = Handler::new(|request: Request| async move {
        match FormData::from_request(&request).await {
            Ok(form) => responses::json(&form.decode(TargetField::single())),
            Err(e) => responses::error(e.status_code(), &e.to_string()),
        }
    });
    let app = app(Settings::default(), vec![Gateway::post("/submit", handler).into()]);

    let request = http::Request::builder()
        .method(Method::POST)
        .uri("/submit")
        .header(HOST, "localhost")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Bytes::from_static(b"tags=a&tags=b&count=42&name=O%27Brien"))
        .unwrap();
    let response = app.handle(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"tags": ["a", "b"], "count": 42, "name": "O'Brien"})
    );

    let request = http::Request::builder()
        .method(Method::POST)
        .uri("/submit")
        .header(HOST, "localhost")
        .header(CONTENT_TYPE, "application/json")
        .body(Bytes::from_static(b"{}"))
        .unwrap();
    let response = app.handle(request).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[test]
fn test_accessor_error_aborts_build() {
    let settings = Settings {
        secret: Secret::new(""),
        ..Settings::default()
    }
    .with_overrides(SettingsOverrides::new().session_config(|settings| {
        if settings.secret.is_empty() {
            return Err(ConfigError::missing_field("secret"));
        }
        Ok(Some(SessionConfig::new(settings.secret.clone())))
    }));

    let err = Application::builder(settings)
        .route(Gateway::get("/", ok()))
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ServerError::Config(ConfigError::ImproperlyConfigured { ref field }) if field == "secret"
    ));
}

#[test]
fn test_duplicate_routes_abort_build() {
    let err = Application::builder(Settings::default())
        .route(Gateway::get("/a", ok()))
        .route(Gateway::get("/a", ok()))
        .build()
        .unwrap_err();
    assert!(matches!(err, ServerError::Route(_)));
}

struct Quiet;

impl Lifespan for Quiet {
    fn startup(&self) -> peridot_core::BoxFuture<'_, LifecycleResult> {
        Box::pin(async { Ok(()) })
    }

    fn shutdown(&self) -> peridot_core::BoxFuture<'_, LifecycleResult> {
        Box::pin(async { Ok(()) })
    }
}

#[test]
fn test_lifespan_with_hooks_aborts_build() {
    let factory: LifespanFactory = Arc::new(|| Box::new(Quiet) as Box<dyn Lifespan>);
    let settings = Settings::default().with_overrides(
        SettingsOverrides::new()
            .lifespan(move |_| Ok(Some(Arc::clone(&factory))))
            .on_shutdown(|_| Ok(Some(vec![LifespanHook::new("close", || async { Ok(()) })]))),
    );
    let err = Application::builder(settings).build().unwrap_err();
    assert!(matches!(err, ServerError::Config(ConfigError::ValidationError(_))));
}
