//! Google Cloud Functions v1 REST client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::auth::TokenProvider;
use super::platform::{FunctionSpec, FunctionsPlatform, PlatformError, RemoteFunction};

const INVOKER_ROLE: &str = "roles/cloudfunctions.invoker";
const ALL_USERS: &str = "allUsers";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    #[serde(default)]
    upload_url: Option<String>,
}

#[derive(Deserialize)]
struct OperationResponse {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionResource {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    https_trigger: Option<TriggerResource>,
    #[serde(default)]
    build_error_message: Option<String>,
}

#[derive(Deserialize)]
struct TriggerResource {
    #[serde(default)]
    url: Option<String>,
}

impl From<FunctionResource> for RemoteFunction {
    fn from(resource: FunctionResource) -> Self {
        RemoteFunction {
            status: resource.status.as_deref().unwrap_or("UNKNOWN").into(),
            url: resource.https_trigger.and_then(|t| t.url),
            build_error: resource.build_error_message,
        }
    }
}

#[derive(Serialize)]
struct IamBinding<'a> {
    role: &'a str,
    members: [&'a str; 1],
}

/// Cloud Functions API over HTTPS with bearer credentials
pub struct CloudFunctionsClient {
    client: Client,
    api_base: String,
    tokens: Arc<dyn TokenProvider>,
}

impl CloudFunctionsClient {
    pub fn new(
        api_base: &str,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_owned(),
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, PlatformError> {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        check(response).await
    }
}

async fn check(response: Response) -> Result<Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PlatformError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl FunctionsPlatform for CloudFunctionsClient {
    async fn authenticate(&self) -> Result<(), PlatformError> {
        self.tokens.access_token().await.map(|_| ())
    }

    async fn generate_upload_url(&self, parent: &str) -> Result<Option<String>, PlatformError> {
        let request = self
            .client
            .post(self.url(&format!("{parent}/functions:generateUploadUrl")))
            .json(&json!({}));

        let body: UploadUrlResponse = self.send(request).await?.json().await?;
        Ok(body.upload_url.filter(|url| !url.is_empty()))
    }

    async fn upload_archive(
        &self,
        upload_url: &str,
        archive: Vec<u8>,
        max_bytes: u64,
    ) -> Result<(), PlatformError> {
        debug!(bytes = archive.len(), "Uploading function archive");
        // Signed URL: no bearer token
        let response = self
            .client
            .put(upload_url)
            .header(reqwest::header::CONTENT_TYPE, "application/zip")
            .header("x-goog-content-length-range", format!("0,{max_bytes}"))
            .body(archive)
            .send()
            .await?;

        check(response).await.map(|_| ())
    }

    async fn create_function(
        &self,
        parent: &str,
        spec: &FunctionSpec,
    ) -> Result<Option<String>, PlatformError> {
        let request = self
            .client
            .post(self.url(&format!("{parent}/functions")))
            .json(spec);

        let operation: OperationResponse = self.send(request).await?.json().await?;
        Ok(operation.name.filter(|name| !name.is_empty()))
    }

    async fn get_function(&self, name: &str) -> Result<RemoteFunction, PlatformError> {
        let request = self.client.get(self.url(name));
        let resource: FunctionResource = self.send(request).await?.json().await?;
        Ok(resource.into())
    }

    async fn allow_public_invocation(&self, name: &str) -> Result<(), PlatformError> {
        let binding = IamBinding {
            role: INVOKER_ROLE,
            members: [ALL_USERS],
        };
        let policy = json!({ "policy": { "bindings": [binding] } });
        let request = self
            .client
            .post(self.url(&format!("{name}:setIamPolicy")))
            .json(&policy);

        self.send(request).await.map(|_| ())
    }

    async fn delete_function(&self, name: &str) -> Result<(), PlatformError> {
        let request = self.client.delete(self.url(name));
        self.send(request).await.map(|_| ())
    }
}
