use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::{Directory, EntitlementDecision, ResourceLocation};
use crate::error::DirectoryError;

/// Header carrying the gateway's own credential to the directory.
pub const DIRECTORY_API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    subject: String,
}

/// Directory reached over HTTP.
///
/// Endpoints, relative to the base URL:
///
/// ```text
/// GET /identity                 Authorization: Bearer <user credential>  -> {"subject": "..."}
/// GET /entitlements/{subject}                                            -> EntitlementDecision
/// GET /resources/{resource_id}                                           -> ResourceLocation
/// ```
///
/// 401/403 on `/identity` means the credential is not valid; 404 on the other
/// two means "no entitlement" and "unknown resource".
#[derive(Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpDirectory {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DirectoryError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DirectoryError::Protocol(format!("invalid directory URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::Protocol(
                "directory URL cannot be used as a base".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.api_key {
            Some(key) => request.header(DIRECTORY_API_KEY_HEADER, key),
            None => request,
        }
    }
}

fn transport(e: reqwest::Error) -> DirectoryError {
    DirectoryError::Transport(e.to_string())
}

fn unexpected(endpoint: &str, status: StatusCode) -> DirectoryError {
    DirectoryError::Protocol(format!("{} returned {}", endpoint, status))
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn authenticate(&self, bearer: &str) -> Result<Option<String>, DirectoryError> {
        let response = self
            .get(self.endpoint(&["identity"]))
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::OK => {
                let identity: IdentityResponse = response
                    .json()
                    .await
                    .map_err(|e| DirectoryError::Protocol(e.to_string()))?;
                if identity.subject.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(identity.subject))
                }
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(unexpected("identity", status)),
        }
    }

    async fn entitlement(&self, subject: &str) -> Result<EntitlementDecision, DirectoryError> {
        let response = self
            .get(self.endpoint(&["entitlements", subject]))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map_err(|e| DirectoryError::Protocol(e.to_string())),
            StatusCode::NOT_FOUND => Ok(EntitlementDecision::none()),
            status => Err(unexpected("entitlements", status)),
        }
    }

    async fn resolve_resource(
        &self,
        resource_id: &str,
    ) -> Result<Option<ResourceLocation>, DirectoryError> {
        let response = self
            .get(self.endpoint(&["resources", resource_id]))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map(Some)
                .map_err(|e| DirectoryError::Protocol(e.to_string())),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(unexpected("resources", status)),
        }
    }
}
