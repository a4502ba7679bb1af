//! Behaviour of accessor overrides and startup resolution.

use std::sync::Arc;

use peridot_config::{
    ConfigError, CsrfConfig, ResolvedSettings, Secret, SessionConfig, Settings, SettingsOverrides,
    StaticFilesConfig,
};
use peridot_core::{
    AllowAny, Lifespan, LifespanFactory, LifespanHook, LifecycleResult, Permission,
};

fn session_requires_secret() -> SettingsOverrides {
    SettingsOverrides::new().session_config(|settings| {
        if settings.secret.is_empty() {
            return Err(ConfigError::missing_field("secret"));
        }
        Ok(Some(SessionConfig::new(settings.secret.clone())))
    })
}

#[test]
fn test_session_override_uses_secret() {
    let settings = Settings {
        secret: Secret::new("k3y"),
        ..Settings::default()
    }
    .with_overrides(session_requires_secret());

    let session = settings.session_config().unwrap().unwrap();
    assert_eq!(session.secret_key.expose(), "k3y");
    assert_eq!(session.session_cookie, "session");
}

#[test]
fn test_session_override_without_secret_fails() {
    let settings = Settings {
        secret: Secret::new(""),
        ..Settings::default()
    }
    .with_overrides(session_requires_secret());

    let err = settings.session_config().unwrap_err();
    assert!(matches!(err, ConfigError::ImproperlyConfigured { ref field } if field == "secret"));
}

#[test]
fn test_struct_literal_with_overrides() {
    let settings = Settings {
        allow_origins: Some(vec!["https://a.example".to_string()]),
        overrides: SettingsOverrides::new().csrf_config(|settings| {
            Ok(Some(CsrfConfig::new(settings.secret.clone())))
        }),
        ..Settings::default()
    };

    assert!(settings.csrf_config().unwrap().is_some());
    let cors = settings.cors_config().unwrap().unwrap();
    assert_eq!(cors.allow_origins, vec!["https://a.example"]);
    assert_eq!(settings.overrides().overridden(), vec!["csrf_config"]);
}

#[test]
fn test_overriding_one_accessor_leaves_others_at_default() {
    let settings = Settings::default().with_overrides(
        SettingsOverrides::new()
            .static_files_config(|_| Ok(Some(StaticFilesConfig::new("/static", "assets")))),
    );

    assert!(settings.static_files_config().unwrap().is_some());
    assert!(settings.csrf_config().unwrap().is_none());
    assert!(settings.session_config().unwrap().is_none());
    assert!(settings.cors_config().unwrap().is_none());
    assert!(settings.template_config().unwrap().is_none());
    assert_eq!(settings.password_hashers().unwrap().len(), 2);
    assert_eq!(settings.openapi_config().unwrap().version, settings.version);
}

#[test]
fn test_override_reads_stored_fields() {
    let settings = Settings {
        debug: true,
        ..Settings::default()
    }
    .with_overrides(SettingsOverrides::new().csrf_config(|settings| {
        Ok(settings
            .debug
            .then(|| CsrfConfig::new(settings.secret.clone())))
    }));

    let csrf = settings.csrf_config().unwrap().unwrap();
    assert_eq!(csrf.cookie_name, "csrftoken");
}

#[test]
fn test_resolve_collects_every_accessor() {
    let settings = Settings {
        allow_origins: Some(vec!["*".to_string()]),
        ..Settings::default()
    }
    .with_overrides(SettingsOverrides::new().permissions(|_| {
        Ok(Some(vec![Arc::new(AllowAny) as Arc<dyn Permission>]))
    }));

    let resolved = ResolvedSettings::resolve(&settings).unwrap();
    assert!(resolved.cors.is_some());
    assert_eq!(resolved.permissions.len(), 1);
    assert!(resolved.middleware.is_empty());
    assert!(resolved.routes.is_empty());
    assert_eq!(resolved.openapi.title, settings.title);
}

#[test]
fn test_resolve_stops_at_failing_accessor() {
    let settings = Settings {
        secret: Secret::new(""),
        ..Settings::default()
    }
    .with_overrides(session_requires_secret());

    let err = ResolvedSettings::resolve(&settings).unwrap_err();
    assert!(err.to_string().contains("secret"));
}

struct Noop;

impl Lifespan for Noop {
    fn startup(&self) -> peridot_core::BoxFuture<'_, LifecycleResult> {
        Box::pin(async { Ok(()) })
    }

    fn shutdown(&self) -> peridot_core::BoxFuture<'_, LifecycleResult> {
        Box::pin(async { Ok(()) })
    }
}

#[test]
fn test_lifespan_and_hooks_are_exclusive() {
    let factory: LifespanFactory = Arc::new(|| Box::new(Noop) as Box<dyn Lifespan>);
    let settings = Settings::default().with_overrides(
        SettingsOverrides::new()
            .lifespan(move |_| Ok(Some(Arc::clone(&factory))))
            .on_startup(|_| Ok(Some(vec![LifespanHook::new("warm", || async { Ok(()) })]))),
    );

    let err = ResolvedSettings::resolve(&settings).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}
