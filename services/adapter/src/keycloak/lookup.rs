//! Name-based lookups against the Keycloak Admin API.
//!
//! # Purpose
//! The Admin API only supports name-filtered listing, not direct addressing
//! by logical name. These lookups resolve logical names to remote records,
//! post-filtering where the remote filter is a substring match.
//!
//! # Key invariants
//! - More matches than a lookup can meaningfully return is an
//!   [`KeycloakError::AmbiguousLookup`], never silently resolved by picking
//!   the first result.
//! - Nothing is cached between requests; callers always see fresh state.
use super::types::{ClientRecord, PermissionRecord, PolicyRecord};
use super::{KeycloakAdminClient, KeycloakError, ensure_success};
use reqwest::Method;

impl KeycloakAdminClient {
    /// Find a client by its logical `clientId` name.
    ///
    /// Keycloak returns at most one element for an exact name filter; zero
    /// and one results are handled, anything more is an ambiguity error.
    pub async fn find_client_by_logical_id(
        &self,
        name: &str,
    ) -> Result<Option<ClientRecord>, KeycloakError> {
        let response = self
            .authenticated_send(
                Method::GET,
                &self.clients_url(),
                &[("clientId", name), ("viewable", "true")],
                None,
            )
            .await?;
        let mut clients: Vec<ClientRecord> = ensure_success(response).await?.json().await?;
        match clients.len() {
            0 => {
                tracing::debug!(client = name, "client not found");
                Ok(None)
            }
            1 => Ok(Some(clients.remove(0))),
            n => Err(KeycloakError::AmbiguousLookup(format!(
                "{n} clients match '{name}'"
            ))),
        }
    }

    /// List all clients viewable by the admin session.
    pub async fn get_all_clients(&self) -> Result<Vec<ClientRecord>, KeycloakError> {
        let response = self
            .authenticated_send(
                Method::GET,
                &self.clients_url(),
                &[("viewableOnly", "true")],
                None,
            )
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    /// Find client policies with exactly the given name.
    ///
    /// The remote filter matches substrings, so results are post-filtered to
    /// the exact name. An empty vec means no match; that is not an error.
    pub async fn find_policies_by_name(
        &self,
        name: &str,
    ) -> Result<Vec<PolicyRecord>, KeycloakError> {
        let resource_server = self.resource_server_id().await?;
        let url = self.authz_url(&resource_server, "policy");
        let response = self
            .authenticated_send(Method::GET, &url, &[("name", name)], None)
            .await?;
        let matching: Vec<PolicyRecord> = ensure_success(response).await?.json().await?;
        Ok(matching
            .into_iter()
            .filter(|policy| policy.name == name)
            .collect())
    }

    /// Find the single authorization permission with the given name.
    ///
    /// Callers rely on exactly one system-managed permission existing per
    /// client, so zero results is a hard error here.
    pub async fn find_permission_by_name(
        &self,
        name: &str,
    ) -> Result<PermissionRecord, KeycloakError> {
        let resource_server = self.resource_server_id().await?;
        let url = self.authz_url(&resource_server, "permission");
        let response = self
            .authenticated_send(Method::GET, &url, &[("name", name)], None)
            .await?;
        let mut permissions: Vec<PermissionRecord> = ensure_success(response).await?.json().await?;
        permissions.retain(|permission| permission.name == name);
        match permissions.len() {
            0 => Err(KeycloakError::NotFound(format!("permission '{name}'"))),
            1 => Ok(permissions.remove(0)),
            n => Err(KeycloakError::AmbiguousLookup(format!(
                "{n} permissions match '{name}'"
            ))),
        }
    }

    /// Token-exchange permission auto-provisioned for the given client.
    pub async fn token_exchange_permission(
        &self,
        client_id: &str,
    ) -> Result<PermissionRecord, KeycloakError> {
        let name = format!("token-exchange.permission.client.{client_id}");
        self.find_permission_by_name(&name).await
    }

    /// Policies currently associated with a permission.
    pub async fn associated_policies(
        &self,
        permission_id: &str,
    ) -> Result<Vec<PolicyRecord>, KeycloakError> {
        let resource_server = self.resource_server_id().await?;
        let url = self.authz_url(
            &resource_server,
            &format!("policy/{permission_id}/associatedPolicies"),
        );
        let response = self
            .authenticated_send(Method::GET, &url, &[], None)
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}
