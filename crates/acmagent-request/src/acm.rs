//! Minimal AWS Certificate Manager client: `RequestCertificate` only.

use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, info};

use acmagent_core::config::AcmConfig;

use crate::certificate::Certificate;
use crate::error::RequestError;
use crate::sigv4::{AwsCredentials, Signer};

pub const DEFAULT_REGION: &str = "us-east-1";

const SERVICE: &str = "acm";
const TARGET: &str = "CertificateManager.RequestCertificate";
const CONTENT_TYPE_JSON: &str = "application/x-amz-json-1.1";

pub struct AcmClient {
    http: Client,
    endpoint: String,
    region: String,
    credentials: AwsCredentials,
}

impl AcmClient {
    pub fn new(region: impl Into<String>, credentials: AwsCredentials) -> Self {
        let region = region.into();
        Self {
            http: Client::new(),
            endpoint: format!("https://acm.{region}.amazonaws.com/"),
            region,
            credentials,
        }
    }

    /// Send requests to `endpoint` instead of the regional AWS host.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Region and endpoint from config, credentials from the environment.
    pub fn from_config(config: &AcmConfig) -> Result<Self, RequestError> {
        let region = resolve_region(
            config.region.as_deref(),
            std::env::var("AWS_REGION").ok(),
            std::env::var("AWS_DEFAULT_REGION").ok(),
        );
        let client = Self::new(region, AwsCredentials::from_env()?);
        Ok(match &config.endpoint {
            Some(endpoint) => client.with_endpoint(endpoint.clone()),
            None => client,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request a new certificate; returns its ARN.
    pub async fn request_certificate(&self, certificate: &Certificate) -> Result<String, RequestError> {
        let body = serde_json::to_vec(&certificate.to_request_body())
            .map_err(|e| RequestError::InvalidResponse(e.to_string()))?;
        debug!(body = %String::from_utf8_lossy(&body), "Requesting certificate");

        let url = Url::parse(&self.endpoint)
            .map_err(|e| RequestError::InvalidResponse(format!("bad endpoint {}: {e}", self.endpoint)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(RequestError::InvalidResponse(format!(
                    "bad endpoint {}: no host",
                    self.endpoint
                )))
            }
        };

        let signer = Signer {
            credentials: &self.credentials,
            region: &self.region,
            service: SERVICE,
        };
        let signed = signer.sign(
            "POST",
            url.path(),
            &[
                ("content-type", CONTENT_TYPE_JSON),
                ("host", host.as_str()),
                ("x-amz-target", TARGET),
            ],
            &body,
            Utc::now(),
        );

        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header("x-amz-target", TARGET);
        for (name, value) in signed {
            request = request.header(name, value);
        }

        let response = request.body(body).send().await?;
        let status = response.status();

        if !status.is_success() {
            // Proxies and load balancers answer with non-JSON bodies.
            let text = response.text().await.unwrap_or_default();
            let payload: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            let code = payload["__type"]
                .as_str()
                .map(|t| t.rsplit('#').next().unwrap_or(t))
                .unwrap_or("UnknownError")
                .to_string();
            let message = payload["message"]
                .as_str()
                .or_else(|| payload["Message"].as_str())
                .map(str::to_string)
                .unwrap_or_else(|| text.trim().chars().take(200).collect());
            return Err(RequestError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        let payload: Value = response.json().await?;
        let arn = payload["CertificateArn"]
            .as_str()
            .ok_or_else(|| RequestError::InvalidResponse("missing CertificateArn".into()))?;
        info!(arn = %arn, domain = %certificate.domain_name, "Certificate requested");
        Ok(arn.to_string())
    }
}

/// Config value, then `AWS_REGION`, then `AWS_DEFAULT_REGION`, then `us-east-1`.
pub fn resolve_region(
    configured: Option<&str>,
    aws_region: Option<String>,
    aws_default_region: Option<String>,
) -> String {
    configured
        .map(str::to_string)
        .or(aws_region)
        .or(aws_default_region)
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

/// Last `/`-separated segment of a certificate ARN.
pub fn certificate_id_from_arn(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}
