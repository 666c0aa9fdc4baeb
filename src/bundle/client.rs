//! HTTP implementation of [`AnalysisApi`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::bundle::api::{
    AnalysisApi, AnalysisRequest, AnalysisResponse, BundleManifest, BundleResponse,
    ExtendBundleRequest, FiltersResponse, ResponseStatus,
};
use crate::bundle::error::ClientError;

pub const DEFAULT_API_URL: &str = "https://deeproxy.snyk.io/";

const SESSION_TOKEN_HEADER: &str = "Session-Token";
const ORG_HEADER: &str = "snyk-org-name";
const REQUEST_ID_HEADER: &str = "snyk-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    CreateBundle,
    CheckBundle,
    ExtendBundle,
    Analysis,
    Filters,
}

impl Endpoint {
    /// Status text documented by the service for each call
    fn describe(self, code: u16) -> String {
        use Endpoint::*;
        let text = match (self, code) {
            (CreateBundle, 200) => "The bundle creation was successful",
            (CheckBundle, 200) => "The bundle checked successfully",
            (ExtendBundle, 200) => "The bundle extension was successful",
            (Analysis, 200) => "The analysis request was successful",
            (Filters, 200) => "The filters request was successful",
            (CreateBundle, 400) => "Request content doesn't match the specifications",
            (ExtendBundle, 400) => {
                "Attempted to extend a git bundle, or ended up with an empty bundle after the extension"
            }
            (_, 401) => "Missing sessionToken or incomplete login process",
            (CreateBundle | Analysis, 403) => "Unauthorized access to requested repository",
            (CheckBundle | ExtendBundle, 403) => "Unauthorized access to parent bundle",
            (CreateBundle, 404) => "Unable to resolve requested oid",
            (CheckBundle, 404) => "Uploaded bundle has expired",
            (ExtendBundle, 404) => "Parent bundle has expired",
            (ExtendBundle, 413) => "Payload too large",
            _ => return format!("Unknown Status Code: {}", code),
        };
        text.to_string()
    }
}

pub struct HttpAnalysisApi {
    client: Client,
    base_url: Url,
    token: String,
}

impl HttpAnalysisApi {
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let normalised = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalised).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ResponseStatus> {
        self.base_url
            .join(path)
            .map_err(|e| ResponseStatus::transport_failure(format!("invalid URL {}: {}", path, e)))
    }

    fn with_headers(&self, builder: RequestBuilder, org: &str, request_id: &str) -> RequestBuilder {
        let builder = builder
            .header(SESSION_TOKEN_HEADER, &self.token)
            .header(REQUEST_ID_HEADER, request_id);
        if org.is_empty() {
            builder
        } else {
            builder.header(ORG_HEADER, org)
        }
    }

    /// Send the request and decode a 200 body; any failure becomes a status
    async fn execute<T: DeserializeOwned + Default>(
        &self,
        endpoint: Endpoint,
        builder: Result<RequestBuilder, ResponseStatus>,
    ) -> (T, ResponseStatus) {
        let builder = match builder {
            Ok(builder) => builder,
            Err(status) => return (T::default(), status),
        };
        let response: Response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("{:?} request failed: {}", endpoint, e);
                return (T::default(), ResponseStatus::transport_failure(e));
            }
        };

        let code = response.status().as_u16();
        let status = ResponseStatus::new(code, endpoint.describe(code));
        if code != 200 {
            return (T::default(), status);
        }
        match response.json::<T>().await {
            Ok(body) => (body, status),
            Err(e) => {
                log::warn!("{:?} response could not be decoded: {}", endpoint, e);
                (T::default(), ResponseStatus::transport_failure(e))
            }
        }
    }
}

/// Request body of `POST analysis`
fn analysis_body(org: &str, request: &AnalysisRequest) -> serde_json::Value {
    let mut key = json!({
        "type": "file",
        "hash": request.bundle_id,
        "shard": request.shard,
    });
    if !request.limit_to_files.is_empty() {
        key["limitToFiles"] = json!(request.limit_to_files);
    }
    json!({
        "key": key,
        "analysisContext": {
            "flow": request.ide_product_name,
            "initiator": "IDE",
            "orgDisplayName": org,
        },
        "severity": request.min_severity,
        "prioritized": false,
        "legacy": true,
    })
}

#[async_trait]
impl AnalysisApi for HttpAnalysisApi {
    async fn create_bundle(
        &self,
        org: &str,
        request_id: &str,
        files: &BundleManifest,
    ) -> BundleResponse {
        let builder = self
            .url("bundle")
            .map(|url| self.with_headers(self.client.post(url), org, request_id).json(files));
        let (response, status): (BundleResponse, _) =
            self.execute(Endpoint::CreateBundle, builder).await;
        BundleResponse { status, ..response }
    }

    async fn extend_bundle(
        &self,
        org: &str,
        request_id: &str,
        bundle_id: &str,
        request: &ExtendBundleRequest,
    ) -> BundleResponse {
        let builder = self.url(&format!("bundle/{}", bundle_id)).map(|url| {
            self.with_headers(self.client.put(url), org, request_id)
                .json(request)
        });
        let (response, status): (BundleResponse, _) =
            self.execute(Endpoint::ExtendBundle, builder).await;
        BundleResponse { status, ..response }
    }

    async fn check_bundle(&self, org: &str, request_id: &str, bundle_id: &str) -> BundleResponse {
        let builder = self
            .url(&format!("bundle/{}", bundle_id))
            .map(|url| self.with_headers(self.client.get(url), org, request_id));
        let (response, status): (BundleResponse, _) =
            self.execute(Endpoint::CheckBundle, builder).await;
        BundleResponse { status, ..response }
    }

    async fn get_analysis(
        &self,
        org: &str,
        request_id: &str,
        request: &AnalysisRequest,
    ) -> AnalysisResponse {
        let body = analysis_body(org, request);
        let builder = self
            .url("analysis")
            .map(|url| self.with_headers(self.client.post(url), org, request_id).json(&body));
        let (response, status): (AnalysisResponse, _) =
            self.execute(Endpoint::Analysis, builder).await;
        AnalysisResponse { status, ..response }
    }

    async fn get_filters(&self, token: &str) -> FiltersResponse {
        let builder = self
            .url("filters")
            .map(|url| self.client.get(url).header(SESSION_TOKEN_HEADER, token));
        let (response, status): (FiltersResponse, _) =
            self.execute(Endpoint::Filters, builder).await;
        FiltersResponse { status, ..response }
    }
}
