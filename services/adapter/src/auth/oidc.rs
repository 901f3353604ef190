//! Bearer-token validation with cached JWKS fetching.
//!
//! # Purpose
//! Verifies inbound bearer tokens against the identity provider's published
//! key set and validates standard claims before any handler runs.
//!
//! # Key invariants
//! - Only RS256 and ES256 are accepted; Keycloak realm keys are RSA by
//!   default and some deployments rotate to EC keys.
//! - Issuer, expiry, and issued-at are validated with a configurable
//!   clock-skew leeway.
//! - When the token's audience differs from this service's client id, the
//!   `azp` claim is required so the calling party stays identifiable.
//! - The JWKS cache is time-bounded and refreshed on an unknown `kid`,
//!   which covers provider key rotation.
//!
//! # Security boundary
//! This module is the boundary between untrusted inbound tokens and the
//! privileged provisioning operations. Claims are decoded without
//! verification only to peek at structure; nothing is trusted before
//! signature verification.
use chrono::Utc;
use dashmap::DashMap;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Inbound token validation settings, derived from configuration.
#[derive(Debug, Clone)]
pub struct OidcSettings {
    /// Expected `iss` claim.
    pub issuer: String,
    /// Explicit JWKS URL; when absent the issuer's discovery document is
    /// fetched to locate it.
    pub jwks_url: Option<String>,
    /// This service's client id, used for the azp rule and role lookup.
    pub client_id: String,
    /// Allowed clock skew for `exp`/`iat` validation, in seconds.
    pub leeway_secs: u64,
}

/// Request-scoped claim set produced by a successful validation.
///
/// Never persisted; handed to handlers for authorization decisions.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Authorized party: the client that obtained the token.
    pub azp: Option<String>,
    /// Token subject.
    pub sub: String,
    /// Roles granted under `resource_access[{client_id}].roles`.
    pub roles: Vec<String>,
}

/// Errors returned during bearer-token validation.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("missing subject")]
    MissingSubject,
    #[error("missing key id")]
    MissingKeyId,
    #[error("missing authorized party")]
    MissingAuthorizedParty,
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("invalid jwk: {0}")]
    InvalidJwk(String),
    #[error("jwks key not found")]
    JwksKeyNotFound,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("invalid claim: {0}")]
    InvalidClaim(String),
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
struct CachedDiscovery {
    jwks_url: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

/// Validator for inbound bearer tokens with a TTL-bounded JWKS cache.
#[derive(Debug, Clone)]
pub struct BearerValidator {
    client: reqwest::Client,
    jwks_cache: Arc<DashMap<String, CachedJwks>>,
    discovery_cache: Arc<DashMap<String, CachedDiscovery>>,
    jwks_ttl: Duration,
    discovery_ttl: Duration,
    settings: Arc<OidcSettings>,
}

impl BearerValidator {
    pub fn new(settings: OidcSettings) -> Self {
        Self::with_ttls(
            settings,
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        )
    }

    pub fn with_ttls(settings: OidcSettings, jwks_ttl: Duration, discovery_ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            jwks_cache: Arc::new(DashMap::new()),
            discovery_cache: Arc::new(DashMap::new()),
            jwks_ttl,
            discovery_ttl,
            settings: Arc::new(settings),
        }
    }

    /// Validate a bearer token and return its verified identity.
    pub async fn validate(&self, token: &str) -> Result<VerifiedIdentity, OidcError> {
        // Step 1: Check the header algorithm before any heavy work.
        let header = decode_header(token)?;
        if !is_algorithm_allowed(header.alg) {
            return Err(OidcError::UnsupportedAlgorithm);
        }
        let kid = header.kid.as_deref().ok_or(OidcError::MissingKeyId)?;

        // Step 2: Resolve and fetch the JWKS, retrying once on a key miss
        // to handle rotation and transient cache inconsistencies.
        let jwks_url = self.resolve_jwks_url().await?;
        let jwks = self.get_jwks(&jwks_url).await?;
        let decoding_key = match find_jwk(&jwks, kid) {
            Some(key) => {
                ensure_jwk_matches_algorithm(key, header.alg)?;
                DecodingKey::from_jwk(key)?
            }
            None => {
                let refreshed = self.refresh_jwks(&jwks_url).await?;
                let key = find_jwk(&refreshed, kid).ok_or(OidcError::JwksKeyNotFound)?;
                ensure_jwk_matches_algorithm(key, header.alg)?;
                DecodingKey::from_jwk(key)?
            }
        };

        // Step 3: Verify signature, issuer, and expiry. Audience is checked
        // through the azp rule below rather than strict `aud` matching,
        // since Keycloak access tokens carry the target service as `aud`.
        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.settings.issuer.as_str()]);
        validation.validate_aud = false;
        validation
            .required_spec_claims
            .extend(["iss".to_string(), "exp".to_string()]);
        validation.leeway = self.settings.leeway_secs;
        let token = decode::<Value>(token, &decoding_key, &validation)?;
        validate_iat(&token.claims, self.settings.leeway_secs)?;

        // Step 4: Enforce the azp rule and extract the verified claim set.
        let azp = extract_string_claim(&token.claims, "azp");
        if azp_required(&token.claims, &self.settings.client_id) && azp.is_none() {
            return Err(OidcError::MissingAuthorizedParty);
        }
        let sub = extract_string_claim(&token.claims, "sub").ok_or(OidcError::MissingSubject)?;
        let roles = extract_resource_roles(&token.claims, &self.settings.client_id);

        Ok(VerifiedIdentity { azp, sub, roles })
    }

    async fn resolve_jwks_url(&self) -> Result<String, OidcError> {
        if let Some(url) = &self.settings.jwks_url {
            return Ok(url.clone());
        }
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            self.settings.issuer.trim_end_matches('/')
        );
        if let Some(entry) = self.discovery_cache.get(&discovery_url)
            && entry.expires_at > Instant::now()
        {
            return Ok(entry.jwks_url.clone());
        }
        let doc: DiscoveryDocument = self.client.get(&discovery_url).send().await?.json().await?;
        self.discovery_cache.insert(
            discovery_url,
            CachedDiscovery {
                jwks_url: doc.jwks_uri.clone(),
                expires_at: Instant::now() + self.discovery_ttl,
            },
        );
        Ok(doc.jwks_uri)
    }

    async fn get_jwks(&self, jwks_url: &str) -> Result<JwkSet, OidcError> {
        if let Some(entry) = self.jwks_cache.get(jwks_url)
            && entry.expires_at > Instant::now()
        {
            return Ok(entry.jwks.clone());
        }
        self.refresh_jwks(jwks_url).await
    }

    async fn refresh_jwks(&self, jwks_url: &str) -> Result<JwkSet, OidcError> {
        let jwks: JwkSet = self.client.get(jwks_url).send().await?.json().await?;
        self.jwks_cache.insert(
            jwks_url.to_string(),
            CachedJwks {
                jwks: jwks.clone(),
                expires_at: Instant::now() + self.jwks_ttl,
            },
        );
        Ok(jwks)
    }
}

fn is_algorithm_allowed(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::RS256 | Algorithm::ES256)
}

fn ensure_jwk_matches_algorithm(
    jwk: &jsonwebtoken::jwk::Jwk,
    alg: Algorithm,
) -> Result<(), OidcError> {
    if let Some(key_alg) = jwk.common.key_algorithm {
        match (key_alg, alg) {
            (KeyAlgorithm::RS256, Algorithm::RS256) => {}
            (KeyAlgorithm::ES256, Algorithm::ES256) => {}
            _ => return Err(OidcError::InvalidJwk("alg mismatch".to_string())),
        }
    }
    match (&jwk.algorithm, alg) {
        (AlgorithmParameters::RSA(_), Algorithm::RS256) => Ok(()),
        (AlgorithmParameters::EllipticCurve(params), Algorithm::ES256) => {
            if params.curve != EllipticCurve::P256 {
                return Err(OidcError::InvalidJwk("unexpected EC curve".to_string()));
            }
            Ok(())
        }
        _ => Err(OidcError::InvalidJwk("kty mismatch".to_string())),
    }
}

fn find_jwk<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a jsonwebtoken::jwk::Jwk> {
    jwks.keys
        .iter()
        .find(|key| key.common.key_id.as_deref() == Some(kid))
}

/// Whether `azp` is required: the token carries an audience that is not
/// solely this service's client id.
fn azp_required(claims: &Value, client_id: &str) -> bool {
    let aud = match claims.get("aud") {
        Some(Value::String(aud)) => aud.as_str(),
        Some(Value::Array(values)) if values.len() == 1 => match values[0].as_str() {
            Some(aud) => aud,
            None => return false,
        },
        _ => return false,
    };
    aud != client_id
}

fn validate_iat(claims: &Value, leeway_seconds: u64) -> Result<(), OidcError> {
    // Require `iat` and ensure it is not unreasonably in the future.
    let iat = claims
        .get("iat")
        .and_then(|value| value.as_i64())
        .ok_or_else(|| OidcError::InvalidClaim("iat".to_string()))?;
    let now = Utc::now().timestamp();
    if iat > now + leeway_seconds as i64 {
        return Err(OidcError::InvalidClaim("iat in future".to_string()));
    }
    Ok(())
}

fn extract_string_claim(claims: &Value, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(|value| value.as_str())
        .map(|value| value.to_string())
}

/// Role grants for this service under `resource_access[{client_id}].roles`.
fn extract_resource_roles(claims: &Value, client_id: &str) -> Vec<String> {
    let Some(roles) = claims
        .get("resource_access")
        .and_then(|access| access.get(client_id))
        .and_then(|entry| entry.get("roles"))
        .and_then(|roles| roles.as_array())
    else {
        return Vec::new();
    };
    roles
        .iter()
        .filter_map(|role| role.as_str().map(|value| value.to_string()))
        .collect()
}
