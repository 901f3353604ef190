//! Shared test fixtures: a scripted mock Keycloak admin server and a mock
//! identity provider serving JWKS for minted RS256 tokens.
#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

// ---------------------------------------------------------------------------
// Mock identity provider (JWKS + token minting)
// ---------------------------------------------------------------------------

pub async fn spawn_jwks_server(jwks: Value) -> (SocketAddr, JoinHandle<()>) {
    // Binding to 127.0.0.1:0 lets the OS choose a free port.
    let app = Router::new().route(
        "/jwks",
        get({
            let jwks = jwks.clone();
            move || {
                let jwks = jwks.clone();
                async move { Json(jwks) }
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = axum::serve(listener, app.into_make_service());
    let handle = tokio::spawn(async move {
        let _ = server.await;
    });
    (addr, handle)
}

pub fn jwks_for_key(key: &RsaPublicKey, kid: &str) -> Value {
    let n = URL_SAFE_NO_PAD.encode(key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(key.e().to_bytes_be());
    json!({
        "keys": [{
            "kty": "RSA",
            "kid": kid,
            "alg": "RS256",
            "use": "sig",
            "n": n,
            "e": e
        }]
    })
}

pub fn mint_token(key: &RsaPrivateKey, kid: &str, claims: Value) -> String {
    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let pem = key.to_pkcs1_pem(LineEnding::LF).expect("pem");
    jsonwebtoken::encode(
        &header,
        &claims,
        &jsonwebtoken::EncodingKey::from_rsa_pem(pem.as_bytes()).expect("enc"),
    )
    .expect("token")
}

// ---------------------------------------------------------------------------
// Mock Keycloak admin server
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MockPolicy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub clients: Vec<String>,
    pub decision_strategy: String,
}

#[derive(Debug)]
pub struct MockPermission {
    pub id: String,
    pub name: String,
    pub decision_strategy: String,
    pub policies: Vec<String>,
}

/// In-memory Keycloak stand-in. Admin endpoints require a bearer token
/// previously issued by the password grant; `fail_next_admin_calls` scripts
/// authorization-expiry responses.
#[derive(Default)]
pub struct MockKeycloak {
    pub fail_next_admin_calls: Mutex<usize>,
    /// Permission queries to answer with an empty list before the stored
    /// permissions become visible, emulating lagging remote provisioning.
    pub defer_permission_queries: Mutex<usize>,
    pub permission_query_count: Mutex<usize>,
    pub admin_tokens: Mutex<Vec<String>>,
    pub grant_log: Mutex<Vec<String>>,
    pub clients: Mutex<Vec<(String, String)>>,
    pub policies: Mutex<Vec<MockPolicy>>,
    pub permissions: Mutex<Vec<MockPermission>>,
    pub fine_grained: Mutex<HashSet<String>>,
    pub registrations: Mutex<Vec<Value>>,
    counter: Mutex<usize>,
}

impl MockKeycloak {
    /// A mock seeded with the realm-management client plus the given
    /// `(physical id, logical name)` pairs.
    pub fn with_clients(clients: &[(&str, &str)]) -> Arc<Self> {
        let mock = Self::default();
        {
            let mut list = mock.clients.lock().unwrap();
            list.push(("rs-master".to_string(), "master-realm".to_string()));
            for (id, name) in clients {
                list.push((id.to_string(), name.to_string()));
            }
        }
        Arc::new(mock)
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        format!("{prefix}-{counter}")
    }

    pub fn script_admin_failures(&self, count: usize) {
        *self.fail_next_admin_calls.lock().unwrap() = count;
    }

    pub fn script_deferred_permission_queries(&self, count: usize) {
        *self.defer_permission_queries.lock().unwrap() = count;
    }

    pub fn permission_query_count(&self) -> usize {
        *self.permission_query_count.lock().unwrap()
    }

    pub fn admin_token_count(&self) -> usize {
        self.admin_tokens.lock().unwrap().len()
    }

    pub fn permission_for(&self, client_id: &str) -> (String, Vec<String>) {
        let name = format!("token-exchange.permission.client.{client_id}");
        let permissions = self.permissions.lock().unwrap();
        let permission = permissions
            .iter()
            .find(|permission| permission.name == name)
            .expect("permission");
        (permission.decision_strategy.clone(), permission.policies.clone())
    }

    pub fn policy_clients(&self, name: &str) -> Vec<String> {
        let policies = self.policies.lock().unwrap();
        policies
            .iter()
            .find(|policy| policy.name == name)
            .map(|policy| policy.clients.clone())
            .expect("policy")
    }

    pub fn seed_policy(&self, name: &str, clients: &[&str]) -> String {
        let id = self.next_id("policy");
        self.policies.lock().unwrap().push(MockPolicy {
            id: id.clone(),
            name: name.to_string(),
            description: String::new(),
            clients: clients.iter().map(|c| c.to_string()).collect(),
            decision_strategy: "UNANIMOUS".to_string(),
        });
        id
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn admin_guard(state: &MockKeycloak, headers: &HeaderMap) -> Result<(), StatusCode> {
    {
        let mut fail = state.fail_next_admin_calls.lock().unwrap();
        if *fail > 0 {
            *fail -= 1;
            return Err(StatusCode::UNAUTHORIZED);
        }
    }
    let token = bearer(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    if !state
        .admin_tokens
        .lock()
        .unwrap()
        .iter()
        .any(|issued| issued == token)
    {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

async fn token_endpoint(
    State(state): State<Arc<MockKeycloak>>,
    Form(params): Form<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    let grant = params.get("grant_type").cloned().unwrap_or_default();
    state.grant_log.lock().unwrap().push(grant.clone());
    let access_token = match grant.as_str() {
        "password" => {
            if params.get("client_id").map(String::as_str) != Some("admin-cli") {
                return Err(StatusCode::BAD_REQUEST);
            }
            let mut tokens = state.admin_tokens.lock().unwrap();
            let token = format!("admin-token-{}", tokens.len() + 1);
            tokens.push(token.clone());
            token
        }
        "client_credentials" => "client-credentials-token".to_string(),
        "urn:ietf:params:oauth:grant-type:token-exchange" => {
            if params.get("subject_token").map(String::as_str)
                != Some("client-credentials-token")
            {
                return Err(StatusCode::BAD_REQUEST);
            }
            "exchanged-token".to_string()
        }
        _ => return Err(StatusCode::BAD_REQUEST),
    };
    Ok(Json(json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 60
    })))
}

async fn list_clients(
    State(state): State<Arc<MockKeycloak>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    admin_guard(&state, &headers)?;
    let clients = state.clients.lock().unwrap();
    let items: Vec<Value> = clients
        .iter()
        .filter(|(_, name)| params.get("clientId").is_none_or(|filter| name == filter))
        .map(|(id, name)| json!({"id": id, "clientId": name, "enabled": true}))
        .collect();
    Ok(Json(Value::Array(items)))
}

async fn management_permissions(
    State(state): State<Arc<MockKeycloak>>,
    Path((_realm, client_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    admin_guard(&state, &headers)?;
    if body["enabled"].as_bool() == Some(true)
        && state.fine_grained.lock().unwrap().insert(client_id.clone())
    {
        // First activation auto-provisions the token-exchange permission.
        let id = state.next_id("permission");
        state.permissions.lock().unwrap().push(MockPermission {
            id,
            name: format!("token-exchange.permission.client.{client_id}"),
            decision_strategy: "UNANIMOUS".to_string(),
            policies: Vec::new(),
        });
    }
    Ok(Json(json!({"enabled": body["enabled"]})))
}

fn policy_json(policy: &MockPolicy) -> Value {
    json!({
        "id": policy.id,
        "name": policy.name,
        "type": "client",
        "logic": "POSITIVE",
        "decisionStrategy": policy.decision_strategy,
        "description": policy.description,
        "config": {"clients": serde_json::to_string(&policy.clients).unwrap()}
    })
}

async fn query_policies(
    State(state): State<Arc<MockKeycloak>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    admin_guard(&state, &headers)?;
    // Keycloak's name filter is a substring match.
    let filter = params.get("name").cloned().unwrap_or_default();
    let policies = state.policies.lock().unwrap();
    let items: Vec<Value> = policies
        .iter()
        .filter(|policy| policy.name.contains(&filter))
        .map(policy_json)
        .collect();
    Ok(Json(Value::Array(items)))
}

async fn create_policy(
    State(state): State<Arc<MockKeycloak>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    admin_guard(&state, &headers)?;
    let id = state.next_id("policy");
    let clients = body["clients"]
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|value| value.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    state.policies.lock().unwrap().push(MockPolicy {
        id: id.clone(),
        name: body["name"].as_str().unwrap_or_default().to_string(),
        description: body["description"].as_str().unwrap_or_default().to_string(),
        clients,
        decision_strategy: body["decisionStrategy"]
            .as_str()
            .unwrap_or("UNANIMOUS")
            .to_string(),
    });
    Ok((StatusCode::CREATED, Json(json!({"id": id}))))
}

async fn update_policy(
    State(state): State<Arc<MockKeycloak>>,
    Path((_realm, _client_id, policy_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<StatusCode, StatusCode> {
    admin_guard(&state, &headers)?;
    let mut policies = state.policies.lock().unwrap();
    let policy = policies
        .iter_mut()
        .find(|policy| policy.id == policy_id)
        .ok_or(StatusCode::NOT_FOUND)?;
    if let Some(values) = body["clients"].as_array() {
        policy.clients = values
            .iter()
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect();
    }
    if let Some(strategy) = body["decisionStrategy"].as_str() {
        policy.decision_strategy = strategy.to_string();
    }
    if let Some(description) = body["description"].as_str() {
        policy.description = description.to_string();
    }
    Ok(StatusCode::CREATED)
}

async fn associated_policies(
    State(state): State<Arc<MockKeycloak>>,
    Path((_realm, _client_id, permission_id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    admin_guard(&state, &headers)?;
    let permissions = state.permissions.lock().unwrap();
    let permission = permissions
        .iter()
        .find(|permission| permission.id == permission_id)
        .ok_or(StatusCode::NOT_FOUND)?;
    let policies = state.policies.lock().unwrap();
    let items: Vec<Value> = permission
        .policies
        .iter()
        .filter_map(|policy_id| {
            policies
                .iter()
                .find(|policy| policy.id == *policy_id)
                .map(policy_json)
        })
        .collect();
    Ok(Json(Value::Array(items)))
}

async fn query_permissions(
    State(state): State<Arc<MockKeycloak>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    admin_guard(&state, &headers)?;
    *state.permission_query_count.lock().unwrap() += 1;
    {
        let mut defer = state.defer_permission_queries.lock().unwrap();
        if *defer > 0 {
            *defer -= 1;
            return Ok(Json(Value::Array(Vec::new())));
        }
    }
    let filter = params.get("name").cloned().unwrap_or_default();
    let permissions = state.permissions.lock().unwrap();
    let items: Vec<Value> = permissions
        .iter()
        .filter(|permission| permission.name.contains(&filter))
        .map(|permission| {
            json!({
                "id": permission.id,
                "name": permission.name,
                "type": "scope",
                "logic": "POSITIVE",
                "decisionStrategy": permission.decision_strategy
            })
        })
        .collect();
    Ok(Json(Value::Array(items)))
}

async fn update_permission(
    State(state): State<Arc<MockKeycloak>>,
    Path((_realm, _client_id, permission_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<StatusCode, StatusCode> {
    admin_guard(&state, &headers)?;
    let mut permissions = state.permissions.lock().unwrap();
    let permission = permissions
        .iter_mut()
        .find(|permission| permission.id == permission_id)
        .ok_or(StatusCode::NOT_FOUND)?;
    if let Some(strategy) = body["decisionStrategy"].as_str() {
        permission.decision_strategy = strategy.to_string();
    }
    if let Some(values) = body["policies"].as_array() {
        permission.policies = values
            .iter()
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect();
    }
    Ok(StatusCode::CREATED)
}

async fn register_client(
    State(state): State<Arc<MockKeycloak>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    // Registration is authenticated with the exchanged client token, not
    // the admin session.
    if bearer(&headers) != Some("exchanged-token") {
        return Err(StatusCode::UNAUTHORIZED);
    }
    state.registrations.lock().unwrap().push(body.clone());
    let mut created = body;
    created["id"] = Value::String(state.next_id("client"));
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn spawn_mock_keycloak(state: Arc<MockKeycloak>) -> (SocketAddr, JoinHandle<()>) {
    let authz = "/auth/admin/realms/:realm/clients/:client_id/authz/resource-server";
    let app = Router::new()
        .route(
            "/auth/realms/:realm/protocol/openid-connect/token",
            post(token_endpoint),
        )
        .route(
            "/auth/realms/:realm/clients-registrations/default",
            post(register_client),
        )
        .route("/auth/admin/realms/:realm/clients", get(list_clients))
        .route(
            "/auth/admin/realms/:realm/clients/:client_id/management/permissions",
            put(management_permissions),
        )
        .route(&format!("{authz}/policy"), get(query_policies))
        .route(&format!("{authz}/policy/client"), post(create_policy))
        .route(
            &format!("{authz}/policy/client/:policy_id"),
            put(update_policy),
        )
        .route(
            &format!("{authz}/policy/:permission_id/associatedPolicies"),
            get(associated_policies),
        )
        .route(&format!("{authz}/permission"), get(query_permissions))
        .route(
            &format!("{authz}/permission/scope/:permission_id"),
            put(update_permission),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = axum::serve(listener, app.into_make_service());
    let handle = tokio::spawn(async move {
        let _ = server.await;
    });
    (addr, handle)
}

/// Admin client wired against a mock Keycloak at `addr`.
pub fn admin_client(addr: SocketAddr) -> adapter::keycloak::KeycloakAdminClient {
    adapter::keycloak::KeycloakAdminClient::new(adapter::keycloak::KeycloakConnection {
        base_url: format!("http://{addr}/auth"),
        realm: "master".to_string(),
        admin_user: "admin".to_string(),
        admin_password: "secret".to_string(),
        client_id: "adapter".to_string(),
        client_secret: "adapter-secret".to_string(),
        target_audience: "authorization-service-api".to_string(),
    })
    .expect("client")
}
