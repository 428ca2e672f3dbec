//! Storage account authorization.
//!
//! Every storage operation starts by fetching a fresh grant. Nothing is cached
//! between operations, so callers hold a grant only for the operation at hand.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::http::read_json;
use crate::{config::StorageConfig, errors::RemoteError, models::storage::AuthorizationGrant};

#[async_trait]
pub trait AccountAuthorizer: Send + Sync {
    async fn authorize(&self) -> Result<AuthorizationGrant, RemoteError>;
}

/// Authorizes against the provider's `b2_authorize_account` endpoint.
#[derive(Clone)]
pub struct B2Authorizer {
    http: Client,
    authorize_url: String,
    account_id: String,
    application_key: String,
}

impl B2Authorizer {
    /// `http` should come from `http::build_client` so the proxy policy applies.
    pub fn new(http: Client, cfg: &StorageConfig) -> Self {
        Self {
            http,
            authorize_url: cfg.authorize_url.clone(),
            account_id: cfg.account_id.clone(),
            application_key: cfg.application_key.clone(),
        }
    }
}

#[async_trait]
impl AccountAuthorizer for B2Authorizer {
    async fn authorize(&self) -> Result<AuthorizationGrant, RemoteError> {
        let response = self
            .http
            .get(&self.authorize_url)
            .basic_auth(&self.account_id, Some(&self.application_key))
            .send()
            .await
            .map_err(|err| {
                let err = RemoteError::from(err);
                warn!(error = %err, "storage authorization request failed");
                err
            })?;

        let grant: AuthorizationGrant = read_json(response).await.inspect_err(|err| {
            warn!(error = %err, "storage authorization rejected");
        })?;

        debug!(
            s3_api_url = grant.s3_api_url.as_deref().unwrap_or("<none>"),
            min_part = grant.absolute_minimum_part_size,
            recommended_part = grant.recommended_part_size,
            "storage account authorized"
        );
        Ok(grant)
    }
}
