//! Keycloak REST adapter service entry point.
//!
//! # Purpose
//! Wires configuration, the admin client, the token validation gate, and the
//! HTTP router, then starts the API server and the metrics endpoint.
use adapter::app::{AppState, build_router};
use adapter::auth::access::AccessRules;
use adapter::auth::oidc::{BearerValidator, OidcSettings};
use adapter::config::AdapterConfig;
use adapter::keycloak::{KeycloakAdminClient, KeycloakConnection};
use adapter::observability;
use anyhow::Context;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AdapterConfig::from_env_or_yaml().context("adapter config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: AdapterConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability();
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let addr = config.bind_addr;
    let state = build_state(config)?;
    let app = build_router(state);

    tracing::info!(%addr, "adapter listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

fn build_state(config: AdapterConfig) -> anyhow::Result<AppState> {
    let keycloak = KeycloakAdminClient::new(KeycloakConnection {
        base_url: config.base_url,
        realm: config.realm.clone(),
        admin_user: config.admin_user,
        admin_password: config.admin_password,
        client_id: config.client_id,
        client_secret: config.client_secret,
        target_audience: config.target_audience,
    })
    .context("build keycloak client")?;

    let validator = BearerValidator::new(OidcSettings {
        issuer: config.oidc_issuer,
        jwks_url: config.oidc_jwks_url,
        client_id: config.oidc_client_id.clone(),
        leeway_secs: config.clock_skew_secs,
    });

    Ok(AppState {
        keycloak: Arc::new(keycloak),
        validator,
        access: AccessRules {
            authorized_apps: config.authorized_apps,
            api_access_role: config.api_access_role,
            user_actions_role: config.user_actions_role,
        },
        api_version: "v1".to_string(),
        realm: config.realm,
    })
}
