//! AWS Cost Explorer `GetCostAndUsage` over HTTPS with SigV4 signing.
//!
//! Cost Explorer is a global service served from `us-east-1`; the configured
//! region only affects credential resolution.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningSettings, sign};
use aws_sigv4::sign::v4::SigningParams;
use aws_smithy_runtime_api::client::identity::Identity;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::response::GetCostAndUsageResponse;
use super::{BillingSource, CostQuery};
use crate::pipeline::CostReading;
use crate::{Error, Result};

pub const COST_EXPLORER_ENDPOINT: &str = "https://ce.us-east-1.amazonaws.com/";
const SIGNING_REGION: &str = "us-east-1";
const SIGNING_NAME: &str = "ce";
const TARGET: &str = "AWSInsightsIndexService.GetCostAndUsage";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const MAX_PAGES: usize = 100;

#[derive(Clone)]
struct CachedCredentials {
    credentials: aws_credential_types::Credentials,
}

impl CachedCredentials {
    fn is_expired(&self) -> bool {
        self.credentials
            .expiry()
            .map(|exp| SystemTime::now() > exp)
            .unwrap_or(false)
    }
}

pub struct CostExplorerClient {
    http: reqwest::Client,
    endpoint: String,
    credentials: Arc<dyn ProvideCredentials>,
    cache: RwLock<Option<CachedCredentials>>,
}

impl CostExplorerClient {
    /// Resolves credentials through the default AWS provider chain.
    pub async fn from_env(region: impl Into<String>) -> Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.into()))
            .load()
            .await;
        let credentials = aws_config
            .credentials_provider()
            .ok_or_else(|| Error::auth("No AWS credentials found"))?;
        Ok(Self::with_credentials(credentials))
    }

    pub fn with_credentials(credentials: impl ProvideCredentials + 'static) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: COST_EXPLORER_ENDPOINT.to_string(),
            credentials: Arc::new(credentials),
            cache: RwLock::new(None),
        }
    }

    /// Overrides the service endpoint (VPC endpoints, local stubs).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_credentials(&self) -> Result<aws_credential_types::Credentials> {
        {
            let cache = self.cache.read().await;
            if let Some(ref cached) = *cache
                && !cached.is_expired()
            {
                return Ok(cached.credentials.clone());
            }
        }

        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| Error::auth(e.to_string()))?;

        *self.cache.write().await = Some(CachedCredentials {
            credentials: credentials.clone(),
        });
        Ok(credentials)
    }

    async fn sign_request(&self, body: &[u8]) -> Result<Vec<(String, String)>> {
        let credentials = self.get_credentials().await?;
        let expiry = credentials.expiry();
        let identity = Identity::new(credentials, expiry);

        let signing_params = SigningParams::builder()
            .identity(&identity)
            .region(SIGNING_REGION)
            .name(SIGNING_NAME)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| Error::auth(e.to_string()))?;

        let headers = [("content-type", CONTENT_TYPE), ("x-amz-target", TARGET)];
        let signable_request = SignableRequest::new(
            "POST",
            &self.endpoint,
            headers.into_iter(),
            SignableBody::Bytes(body),
        )
        .map_err(|e| Error::auth(e.to_string()))?;

        let (signing_instructions, _) = sign(signable_request, &signing_params.into())
            .map_err(|e| Error::auth(e.to_string()))?
            .into_parts();

        Ok(signing_instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }

    async fn get_page(
        &self,
        query: &CostQuery,
        next_page_token: Option<&str>,
    ) -> Result<GetCostAndUsageResponse> {
        let body = serde_json::to_vec(&query.to_request_body(next_page_token))?;
        let signed_headers = self.sign_request(&body).await?;

        let mut request = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", TARGET)
            .body(body);
        for (name, value) in signed_headers {
            request = request.header(&name, &value);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, message });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl std::fmt::Debug for CostExplorerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostExplorerClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BillingSource for CostExplorerClient {
    fn name(&self) -> &str {
        "cost-explorer"
    }

    async fn fetch(&self, query: &CostQuery) -> Result<Vec<CostReading>> {
        let (start, end) = query.time_period();
        info!(start_date = %start, end_date = %end, granularity = %query.granularity, "Fetching AWS costs");

        let mut readings = Vec::new();
        let mut periods = 0;
        let mut token: Option<String> = None;

        for page in 0..MAX_PAGES {
            let response = self.get_page(query, token.as_deref()).await?;
            periods += response.results_by_time.len();
            token = response.next_page_token.clone();
            readings.extend(response.into_readings()?);

            match token {
                Some(ref t) if !t.is_empty() => debug!(page, "Following NextPageToken"),
                _ => break,
            }
        }
        if token.as_deref().is_some_and(|t| !t.is_empty()) {
            warn!(max_pages = MAX_PAGES, "Stopped paging Cost Explorer results early");
            return Err(Error::Fetch(format!(
                "results still paginated after {} pages",
                MAX_PAGES
            )));
        }

        if readings.is_empty() {
            warn!(periods, "No cost data returned from AWS");
        } else {
            info!(periods, total_groups = readings.len(), "AWS costs fetched successfully");
        }
        Ok(readings)
    }
}
