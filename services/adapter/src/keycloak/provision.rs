//! Token-exchange permission provisioning.
//!
//! # Purpose
//! Grants a requestor client the right to exchange tokens for a target
//! client by creating or updating the interlinked policy and permission
//! records on the Keycloak side.
//!
//! # Key invariants
//! - Previously granted parties are never revoked: the subscribed-clients
//!   set and the permission's policy list only ever accumulate.
//! - Applying the same grant twice leaves the remote state unchanged
//!   (subscribed clients and policy lists are deduplicated).
//! - The permission's decision strategy escalates from UNANIMOUS to
//!   AFFIRMATIVE once more than zero policies are associated, and never
//!   regresses.
//!
//! # Failure model
//! Each step aborts the whole operation on failure; there is no compensating
//! rollback. The final permission update recomputes its policy list from
//! fresh remote state, so a failed grant can safely be re-invoked to
//! converge.
use super::types::{ClientPolicyPayload, DecisionStrategy};
use super::{KeycloakAdminClient, KeycloakError, ensure_success};
use reqwest::{Method, StatusCode};
use serde_json::json;
use std::time::Duration;

/// Delay before retrying the permission fetch right after enabling
/// fine-grained permissions; remote provisioning may lag the enable call.
const PERMISSION_RETRY_DELAY: Duration = Duration::from_millis(250);

impl KeycloakAdminClient {
    /// Enable or disable fine-grained admin permissions for a client.
    ///
    /// Setting `enabled=true` repeatedly is a remote no-op.
    pub async fn set_fine_grain_permission(
        &self,
        client_id: &str,
        enabled: bool,
    ) -> Result<(), KeycloakError> {
        tracing::info!(client = client_id, enabled, "setting fine grain permissions");
        let url = format!("{}/{}/management/permissions", self.clients_url(), client_id);
        let body = json!({ "enabled": enabled });
        let response = self
            .authenticated_send(Method::PUT, &url, &[], Some(&body))
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Create the named client policy, or append `client_id` to its
    /// subscribed clients if it already exists.
    pub async fn create_or_update_client_policy(
        &self,
        client_id: &str,
        policy_name: &str,
        description: &str,
    ) -> Result<(), KeycloakError> {
        let resource_server = self.resource_server_id().await?;
        let existing = self.find_policies_by_name(policy_name).await?;

        let (method, url, payload) = match existing.first() {
            None => {
                tracing::info!(policy = policy_name, client = client_id, "creating policy");
                let url = self.authz_url(&resource_server, "policy/client");
                let payload = ClientPolicyPayload::client_policy(
                    policy_name,
                    description,
                    vec![client_id.to_string()],
                );
                (Method::POST, url, payload)
            }
            Some(policy) => {
                tracing::info!(
                    policy = policy_name,
                    client = client_id,
                    "subscribing client to existing policy"
                );
                let url = self.authz_url(&resource_server, &format!("policy/client/{}", policy.id));
                let mut clients = policy.subscribed_clients()?;
                if !clients.iter().any(|id| id == client_id) {
                    clients.push(client_id.to_string());
                }
                let mut payload =
                    ClientPolicyPayload::client_policy(policy_name, description, clients);
                payload.decision_strategy = policy.decision_strategy;
                (Method::PUT, url, payload)
            }
        };

        let body = serde_json::to_value(&payload)?;
        let response = self
            .authenticated_send(method, &url, &[], Some(&body))
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Grant `requestor_id` permission to exchange tokens for `target_id`.
    ///
    /// Returns the status of the final permission update.
    pub async fn grant_token_exchange(
        &self,
        target_id: &str,
        requestor_id: &str,
    ) -> Result<StatusCode, KeycloakError> {
        // Step 1: Enable fine-grained permissions on the target client.
        // This is the call that makes Keycloak auto-provision the
        // token-exchange permission on first activation.
        self.set_fine_grain_permission(target_id, true).await?;

        // Step 2: Fetch the target's token-exchange permission, retrying
        // once because remote provisioning may be asynchronous.
        let permission = match self.token_exchange_permission(target_id).await {
            Err(KeycloakError::NotFound(_)) => {
                tokio::time::sleep(PERMISSION_RETRY_DELAY).await;
                self.token_exchange_permission(target_id).await?
            }
            other => other?,
        };

        // Step 3: Snapshot the currently associated policies.
        let existing = self.associated_policies(&permission.id).await?;
        let mut policies: Vec<String> = existing.into_iter().map(|policy| policy.id).collect();

        // Steps 4-5: Create or update the requestor's policy.
        let policy_name = format!("allow token exchange for {requestor_id}");
        let policy_description = format!("Allow token exchange for '{requestor_id}' client");
        self.create_or_update_client_policy(requestor_id, &policy_name, &policy_description)
            .await?;

        // Step 6: Re-fetch by name to obtain the policy's physical id; the
        // create/update response does not echo the full record.
        let policy = self
            .find_policies_by_name(&policy_name)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KeycloakError::NotFound(format!("policy '{policy_name}'")))?;

        // Steps 7-8: Append the policy id without duplicates and escalate
        // the decision strategy once more than zero policies were present.
        // AFFIRMATIVE is never walked back.
        let mut permission = permission;
        if !policies.is_empty() {
            permission.decision_strategy = DecisionStrategy::Affirmative;
        }
        if !policies.iter().any(|id| *id == policy.id) {
            policies.push(policy.id);
        }
        permission.policies = policies;

        // Step 9: Write the updated permission back.
        tracing::info!(
            target = target_id,
            requestor = requestor_id,
            "granting token exchange"
        );
        let resource_server = self.resource_server_id().await?;
        let url = self.authz_url(
            &resource_server,
            &format!("permission/scope/{}", permission.id),
        );
        let body = serde_json::to_value(&permission)?;
        let response = self
            .authenticated_send(Method::PUT, &url, &[], Some(&body))
            .await?;
        let response = ensure_success(response).await?;
        metrics::counter!("adapter_token_exchange_grants_total").increment(1);
        Ok(response.status())
    }
}
