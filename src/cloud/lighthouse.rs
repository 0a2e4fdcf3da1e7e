//! Tencent Cloud Lighthouse integration.
//!
//! API docs: https://cloud.tencent.com/document/product/1207
//! Endpoint: https://lighthouse.tencentcloudapi.com/ (API 3.0, version 2020-03-24)
//! Auth: TC3-HMAC-SHA256 signature in the `Authorization` header.
//!
//! Every response is wrapped in `{"Response": {...}}`. Failures come back
//! as HTTP 200 with `Response.Error = {Code, Message}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::signer::{Tc3Signer, CONTENT_TYPE};
use super::BundleProvider;
use crate::config::{LighthouseConfig, Secrets};
use crate::types::{Bundle, BundleSnapshot, ProviderError, SalesState};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const API_VERSION: &str = "2020-03-24";

// ---------------------------------------------------------------------------
// API response types (Lighthouse JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "Response")]
    response: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SdkError {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeBundlesResponse {
    #[serde(default)]
    error: Option<SdkError>,
    #[serde(default)]
    bundle_set: Vec<LighthouseBundle>,
    #[serde(default)]
    request_id: String,
}

/// One entry of `BundleSet`. Only the fields we report on.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LighthouseBundle {
    bundle_id: String,
    bundle_sales_state: String,
    #[serde(default)]
    bundle_type_description: String,
    #[serde(rename = "CPU", default)]
    cpu: u32,
    /// GB.
    #[serde(default)]
    memory: u32,
}

impl From<LighthouseBundle> for Bundle {
    fn from(b: LighthouseBundle) -> Self {
        Bundle {
            id: b.bundle_id,
            type_description: b.bundle_type_description,
            cpu: b.cpu,
            memory: b.memory,
            sales_state: SalesState::from(b.bundle_sales_state),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateInstancesResponse {
    #[serde(default)]
    error: Option<SdkError>,
    #[serde(default)]
    instance_id_set: Vec<String>,
    #[serde(default)]
    request_id: String,
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeBundlesRequest<'a> {
    bundle_ids: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateInstancesRequest<'a> {
    region: &'a str,
    bundle_id: &'a str,
    blueprint_id: &'a str,
    instance_count: u32,
    instance_charge_prepaid: ChargePrepaid<'a>,
    login_configuration: LoginConfiguration<'a>,
    auto_voucher: bool,
    /// Idempotency token: a retransmitted request with the same token
    /// creates nothing new.
    client_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChargePrepaid<'a> {
    period: u32,
    renew_flag: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoginConfiguration<'a> {
    auto_generate_password: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

fn api_error(err: SdkError, request_id: String) -> ProviderError {
    ProviderError::Api {
        code: err.code,
        message: err.message,
        request_id,
    }
}

/// Parse a `DescribeBundles` body into a snapshot, keeping provider order.
pub fn parse_describe_bundles(body: &str) -> Result<BundleSnapshot, ProviderError> {
    let envelope: Envelope<DescribeBundlesResponse> = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("DescribeBundles: {e}")))?;
    let resp = envelope.response;

    if let Some(err) = resp.error {
        return Err(api_error(err, resp.request_id));
    }

    Ok(resp.bundle_set.into_iter().map(Bundle::from).collect())
}

/// Parse a `CreateInstances` body into the created instance ids.
pub fn parse_create_instances(body: &str) -> Result<Vec<String>, ProviderError> {
    let envelope: Envelope<CreateInstancesResponse> = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("CreateInstances: {e}")))?;
    let resp = envelope.response;

    if let Some(err) = resp.error {
        return Err(api_error(err, resp.request_id));
    }

    Ok(resp.instance_id_set)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Lighthouse API client scoped to one region and a fixed set of bundles.
pub struct LighthouseClient {
    http: Client,
    signer: Tc3Signer,
    base_url: String,
    region: String,
    bundle_ids: Vec<String>,
    blueprint_id: String,
    period_months: u32,
    renew_flag: String,
    auto_voucher: bool,
    root_password: Option<SecretString>,
}

impl LighthouseClient {
    pub fn new(cfg: &LighthouseConfig, secrets: &Secrets) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent("LHBOT/0.1.0 (bundle-watcher)")
            .build()
            .context("Failed to build HTTP client for Lighthouse")?;

        Ok(Self {
            http,
            signer: Tc3Signer::new(
                secrets.secret_id.clone(),
                secrets.secret_key.clone(),
                &cfg.endpoint,
            ),
            base_url: format!("https://{}/", cfg.endpoint),
            region: cfg.region.clone(),
            bundle_ids: cfg.bundle_ids.clone(),
            blueprint_id: cfg.blueprint_id.clone(),
            period_months: cfg.period_months,
            renew_flag: cfg.renew_flag.clone(),
            auto_voucher: cfg.auto_voucher,
            root_password: secrets.root_password.clone(),
        })
    }

    /// Send requests somewhere other than the signed endpoint host.
    #[cfg(test)]
    fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Body of a `CreateInstances` call.
    fn create_instances_body(
        &self,
        bundle_id: &str,
        client_token: &str,
    ) -> Result<String, ProviderError> {
        let login_configuration = match &self.root_password {
            Some(pw) => LoginConfiguration {
                auto_generate_password: "NO",
                password: Some(pw.expose_secret().as_str()),
            },
            None => LoginConfiguration {
                auto_generate_password: "YES",
                password: None,
            },
        };
        let request = CreateInstancesRequest {
            region: &self.region,
            bundle_id,
            blueprint_id: &self.blueprint_id,
            instance_count: 1,
            instance_charge_prepaid: ChargePrepaid {
                period: self.period_months,
                renew_flag: &self.renew_flag,
            },
            login_configuration,
            auto_voucher: self.auto_voucher,
            client_token,
        };
        serde_json::to_string(&request).map_err(|e| ProviderError::Request(e.to_string()))
    }

    /// Send a signed API call and return the raw body.
    async fn call(&self, action: &str, payload: String) -> Result<String, ProviderError> {
        let timestamp = Utc::now().timestamp();
        let authorization = self.signer.authorization(&payload, timestamp)?;
        debug!(action, host = %self.signer.host(), url = %self.base_url, "Calling Lighthouse API");

        let resp = self
            .http
            .post(&self.base_url)
            .header("Authorization", authorization)
            .header("Content-Type", CONTENT_TYPE)
            .header("X-TC-Action", action)
            .header("X-TC-Version", API_VERSION)
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("X-TC-Region", &self.region)
            .body(payload)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{action}: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("{action}: reading body: {e}")))?;

        if !status.is_success() {
            return Err(ProviderError::Transport(format!("{action}: HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl BundleProvider for LighthouseClient {
    async fn fetch_bundles(&self) -> Result<BundleSnapshot, ProviderError> {
        let payload = serde_json::to_string(&DescribeBundlesRequest {
            bundle_ids: &self.bundle_ids,
        })
        .map_err(|e| ProviderError::Request(e.to_string()))?;

        let body = self.call("DescribeBundles", payload).await?;
        parse_describe_bundles(&body)
    }

    async fn create_instance(&self, bundle_id: &str) -> Result<Vec<String>, ProviderError> {
        let client_token = uuid::Uuid::new_v4().to_string();
        let payload = self.create_instances_body(bundle_id, &client_token)?;

        info!(bundle_id, region = %self.region, "Placing CreateInstances order");
        let body = self.call("CreateInstances", payload).await?;
        debug!(body = %body, "CreateInstances response body");

        parse_create_instances(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
