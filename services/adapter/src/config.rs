use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

// Adapter configuration sourced from environment variables, with an
// optional YAML override file (KC_ADAPTER_CONFIG).
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    /// Base URL of the Keycloak deployment, e.g. `https://kc.example.org/auth`.
    pub base_url: String,
    pub realm: String,
    pub admin_user: String,
    pub admin_password: String,
    /// The adapter's own service client and secret.
    pub client_id: String,
    pub client_secret: String,
    /// Audience for the registration token exchange.
    pub target_audience: String,
    pub oidc_issuer: String,
    pub oidc_jwks_url: Option<String>,
    /// Client id inbound roles are read under (`resource_access` key).
    pub oidc_client_id: String,
    pub authorized_apps: Vec<String>,
    pub api_access_role: String,
    pub user_actions_role: String,
    pub clock_skew_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
struct AdapterConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    base_url: Option<String>,
    realm: Option<String>,
    admin_user: Option<String>,
    admin_password: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    target_audience: Option<String>,
    oidc_issuer: Option<String>,
    oidc_jwks_url: Option<String>,
    oidc_client_id: Option<String>,
    authorized_apps: Option<Vec<String>>,
    api_access_role: Option<String>,
    user_actions_role: Option<String>,
    clock_skew_secs: Option<u64>,
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("missing required env var {name}"))
}

impl AdapterConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("KC_ADAPTER_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse KC_ADAPTER_BIND")?;
        let metrics_bind = std::env::var("KC_ADAPTER_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:9102".to_string())
            .parse()
            .with_context(|| "parse KC_ADAPTER_METRICS_BIND")?;
        let authorized_apps = std::env::var("KC_ADAPTER_AUTHORIZED_APPS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|app| !app.is_empty())
            .map(str::to_string)
            .collect();
        let clock_skew_secs = std::env::var("KC_ADAPTER_CLOCK_SKEW_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse()
            .with_context(|| "parse KC_ADAPTER_CLOCK_SKEW_SECS")?;
        Ok(Self {
            bind_addr,
            metrics_bind,
            base_url: required("KC_ADAPTER_BASE_URL")?,
            realm: std::env::var("KC_ADAPTER_REALM").unwrap_or_else(|_| "master".to_string()),
            admin_user: required("KC_ADAPTER_ADMIN_USER")?,
            admin_password: required("KC_ADAPTER_ADMIN_PASSWORD")?,
            client_id: required("KC_ADAPTER_CLIENT_ID")?,
            client_secret: required("KC_ADAPTER_CLIENT_SECRET")?,
            target_audience: required("KC_ADAPTER_TARGET_AUDIENCE")?,
            oidc_issuer: required("KC_ADAPTER_OIDC_ISSUER")?,
            oidc_jwks_url: std::env::var("KC_ADAPTER_OIDC_JWKS_URL").ok(),
            oidc_client_id: required("KC_ADAPTER_OIDC_CLIENT_ID")?,
            authorized_apps,
            api_access_role: std::env::var("KC_ADAPTER_API_ACCESS_ROLE")
                .unwrap_or_else(|_| "api-access".to_string()),
            user_actions_role: std::env::var("KC_ADAPTER_USER_ACTIONS_ROLE")
                .unwrap_or_else(|_| "user-actions".to_string()),
            clock_skew_secs,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("KC_ADAPTER_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read KC_ADAPTER_CONFIG: {path}"))?;
            let override_cfg: AdapterConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse adapter config yaml")?;
            config.apply_override(override_cfg)?;
        }
        Ok(config)
    }

    fn apply_override(&mut self, override_cfg: AdapterConfigOverride) -> Result<()> {
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.base_url {
            self.base_url = value;
        }
        if let Some(value) = override_cfg.realm {
            self.realm = value;
        }
        if let Some(value) = override_cfg.admin_user {
            self.admin_user = value;
        }
        if let Some(value) = override_cfg.admin_password {
            self.admin_password = value;
        }
        if let Some(value) = override_cfg.client_id {
            self.client_id = value;
        }
        if let Some(value) = override_cfg.client_secret {
            self.client_secret = value;
        }
        if let Some(value) = override_cfg.target_audience {
            self.target_audience = value;
        }
        if let Some(value) = override_cfg.oidc_issuer {
            self.oidc_issuer = value;
        }
        if let Some(value) = override_cfg.oidc_jwks_url {
            self.oidc_jwks_url = Some(value);
        }
        if let Some(value) = override_cfg.oidc_client_id {
            self.oidc_client_id = value;
        }
        if let Some(value) = override_cfg.authorized_apps {
            self.authorized_apps = value;
        }
        if let Some(value) = override_cfg.api_access_role {
            self.api_access_role = value;
        }
        if let Some(value) = override_cfg.user_actions_role {
            self.user_actions_role = value;
        }
        if let Some(value) = override_cfg.clock_skew_secs {
            self.clock_skew_secs = value;
        }
        Ok(())
    }
}
