//! S3-compatible client construction against an authorization grant.
//!
//! The storage provider exposes an S3 API at the grant's `s3ApiUrl`; requests
//! are signed with the account key pair acting as the S3 access key pair.

use aws_sdk_s3::{
    Client,
    config::{
        BehaviorVersion, Credentials, Region, RequestChecksumCalculation, http::HttpResponse,
    },
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
};
use url::Url;

use crate::{
    config::StorageConfig,
    errors::{RemoteError, StorageError, StorageResult},
    models::storage::AuthorizationGrant,
};

/// Account credentials plus the bucket every object lives in.
#[derive(Clone)]
pub struct StorageAccount {
    pub key_id: String,
    pub application_key: String,
    pub bucket: String,
}

impl From<&StorageConfig> for StorageAccount {
    fn from(cfg: &StorageConfig) -> Self {
        Self {
            key_id: cfg.account_id.clone(),
            application_key: cfg.application_key.clone(),
            bucket: cfg.bucket.clone(),
        }
    }
}

impl StorageAccount {
    /// Client for the grant's endpoint. `session_token` is attached to the
    /// signing credentials when given.
    pub fn client(
        &self,
        grant: &AuthorizationGrant,
        session_token: Option<String>,
    ) -> StorageResult<Client> {
        let endpoint = grant.s3_endpoint()?;
        let region = region_from_endpoint(endpoint)?;
        let credentials = Credentials::new(
            &self.key_id,
            &self.application_key,
            session_token,
            None,
            "storage-account",
        );

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .build();

        Ok(Client::from_conf(config))
    }
}

/// Region is the second label of the endpoint host:
/// `https://s3.us-west-004.backblazeb2.com` -> `us-west-004`.
pub fn region_from_endpoint(endpoint: &str) -> StorageResult<String> {
    let url = Url::parse(endpoint).map_err(|err| {
        StorageError::Remote(RemoteError::RequestMalformed(format!(
            "invalid S3 endpoint `{endpoint}`: {err}"
        )))
    })?;
    url.host_str()
        .and_then(|host| host.split('.').nth(1))
        .filter(|region| !region.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            StorageError::Remote(RemoteError::RequestMalformed(format!(
                "cannot derive region from `{endpoint}`"
            )))
        })
}

/// Random per-call session token for presigning credentials.
pub fn session_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

/// Classify an SDK failure into the pipeline's tagged error.
pub fn classify<E>(err: SdkError<E, HttpResponse>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match &err {
        SdkError::ConstructionFailure(_) => {
            RemoteError::RequestMalformed(DisplayErrorContext(&err).to_string())
        }
        SdkError::ServiceError(ctx) => RemoteError::RemoteRejected {
            status: ctx.raw().status().as_u16(),
            payload: ctx
                .err()
                .message()
                .or_else(|| ctx.err().code())
                .unwrap_or("service error")
                .to_string(),
        },
        SdkError::ResponseError(ctx) => RemoteError::RemoteRejected {
            status: ctx.raw().status().as_u16(),
            payload: DisplayErrorContext(&err).to_string(),
        },
        _ => RemoteError::NetworkUnavailable(DisplayErrorContext(&err).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_is_second_host_label() {
        assert_eq!(
            region_from_endpoint("https://s3.us-west-004.backblazeb2.com").unwrap(),
            "us-west-004"
        );
        assert_eq!(
            region_from_endpoint("https://s3.eu-central-003.backblazeb2.com/").unwrap(),
            "eu-central-003"
        );
    }

    #[test]
    fn single_label_hosts_have_no_region() {
        assert!(region_from_endpoint("http://localhost:9000").is_err());
        assert!(region_from_endpoint("not a url").is_err());
    }

    #[test]
    fn session_tokens_are_fresh() {
        let a = session_token();
        let b = session_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
