//! Shared plumbing for outbound JSON calls made with `reqwest`.

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::errors::RemoteError;

/// Build the outbound client. `bypass_proxy` ignores any proxy configured in
/// the environment instead of unsetting the variables process-wide.
pub fn build_client(bypass_proxy: bool) -> Result<Client, RemoteError> {
    let mut builder = Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if bypass_proxy {
        builder = builder.no_proxy();
    }
    builder
        .build()
        .map_err(|err| RemoteError::RequestMalformed(format!("building HTTP client: {err}")))
}

/// Read a response body, mapping non-2xx statuses and undecodable bodies to
/// `RemoteRejected` with the raw payload.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let status = response.status();
    let payload = response.text().await?;
    if !status.is_success() {
        return Err(RemoteError::RemoteRejected {
            status: status.as_u16(),
            payload,
        });
    }
    serde_json::from_str(&payload).map_err(|_| RemoteError::RemoteRejected {
        status: status.as_u16(),
        payload,
    })
}
