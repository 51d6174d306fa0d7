//! HTTP client for the eMAG Marketplace API.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::convert::{format_emag_date, to_platform_offer, to_platform_order};
use super::error::{EmagError, is_rate_limit_error, short_error_message};
use super::types::{CountResults, Envelope};
use crate::entity::integration::Model as IntegrationModel;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpRequest, HttpTransport};
use crate::platform::{
    self, MarketplaceClient, PlatformOffer, PlatformOrder, ProgressCallback, ReadFilter,
    RecordCount, Resource, ResourceLimiters, rate_limits,
};
use crate::retry::{RetryPolicy, with_retry};
use crate::sync::MAX_PAGE_SIZE;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Tunables shared by every client built from configuration.
#[derive(Debug, Clone)]
pub struct EmagClientOptions {
    pub timeout: StdDuration,
    pub orders_rps: u32,
    pub default_rps: u32,
    pub retry: RetryPolicy,
    /// Replaces the region's API host, for sandboxes.
    pub base_url: Option<String>,
}

impl Default for EmagClientOptions {
    fn default() -> Self {
        Self {
            timeout: StdDuration::from_secs(DEFAULT_TIMEOUT_SECS),
            orders_rps: rate_limits::EMAG_ORDERS_RPS,
            default_rps: rate_limits::EMAG_DEFAULT_RPS,
            retry: RetryPolicy::default(),
            base_url: None,
        }
    }
}

/// Client for one seller account.
///
/// Every request waits on the resource's rate limiter first; rate-limited
/// answers are retried with backoff.
#[derive(Clone)]
pub struct EmagClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    authorization: String,
    integration_id: Uuid,
    limiters: ResourceLimiters,
    retry: RetryPolicy,
}

impl EmagClient {
    /// Build a client for a stored integration over a fresh reqwest transport.
    ///
    /// ```ignore
    /// let client = EmagClient::new(&integration, &EmagClientOptions::default())?;
    /// let count = client.count_records(Resource::Orders, &ReadFilter::default()).await?;
    /// ```
    pub fn new(
        integration: &IntegrationModel,
        options: &EmagClientOptions,
    ) -> Result<Self, EmagError> {
        let transport = ReqwestTransport::with_timeout(options.timeout)
            .map_err(|e| EmagError::Config(e.to_string()))?;
        Ok(Self::for_integration(
            integration,
            options,
            Arc::new(transport),
        ))
    }

    pub fn for_integration(
        integration: &IntegrationModel,
        options: &EmagClientOptions,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let base_url = options
            .base_url
            .clone()
            .unwrap_or_else(|| integration.api_url().to_string());
        Self::new_with_transport(
            integration.id,
            &base_url,
            &integration.username,
            &integration.password,
            options,
            transport,
        )
    }

    pub fn new_with_transport(
        integration_id: Uuid,
        base_url: &str,
        username: &str,
        password: &str,
        options: &EmagClientOptions,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: basic_auth(username, password),
            integration_id,
            limiters: ResourceLimiters::new(options.orders_rps, options.default_rps),
            retry: options.retry.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, resource: Resource, action: &str) -> String {
        format!("{}/{}/{}", self.base_url, resource.api_path(), action)
    }

    /// POST `body` to `<resource>/<action>` and unwrap the envelope.
    async fn post<T: DeserializeOwned>(
        &self,
        resource: Resource,
        action: &str,
        body: &Value,
    ) -> Result<T, EmagError> {
        self.limiters.for_resource(resource).wait().await;

        let url = self.url(resource, action);
        let request = HttpRequest::json(
            url.clone(),
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), "emag-desk".to_string()),
                ("Authorization".to_string(), self.authorization.clone()),
            ],
            body,
        )
        .map_err(|e| EmagError::Http(e.to_string()))?;

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| EmagError::Http(e.to_string()))?;

        match response.status {
            401 | 403 => {
                return Err(EmagError::Auth(response.body_text()));
            }
            429 => {
                return Err(EmagError::RateLimited {
                    retry_after_secs: response.retry_after_secs,
                });
            }
            _ if !response.is_success() => {
                return Err(EmagError::Api {
                    status: response.status,
                    message: response.body_text(),
                });
            }
            _ => {}
        }

        let envelope: Envelope<T> = serde_json::from_slice(&response.body)?;
        if envelope.is_error {
            let message = envelope.joined_messages();
            tracing::debug!(url = %url, message = %message, "eMAG returned isError");
            return Err(EmagError::Rejected(if message.is_empty() {
                "no message".to_string()
            } else {
                message
            }));
        }
        envelope
            .results
            .ok_or_else(|| EmagError::Decode(format!("{url}: missing results")))
    }

    pub async fn count_records(
        &self,
        resource: Resource,
        filter: &ReadFilter,
    ) -> Result<RecordCount, EmagError> {
        let body = Value::Object(filter_body(resource, filter));
        let results: CountResults = self.post(resource, "count", &body).await?;
        Ok(RecordCount {
            items: results.no_of_items,
            pages: results.no_of_pages,
        })
    }

    /// One raw page (pages start at 1, at most 100 items).
    pub async fn read_page(
        &self,
        resource: Resource,
        page: u32,
        items_per_page: u32,
        filter: &ReadFilter,
    ) -> Result<Vec<Value>, EmagError> {
        let mut body = filter_body(resource, filter);
        body.insert("currentPage".to_string(), json!(page.max(1)));
        body.insert(
            "itemsPerPage".to_string(),
            json!(items_per_page.clamp(1, MAX_PAGE_SIZE)),
        );
        self.post(resource, "read", &Value::Object(body)).await
    }

    /// Cheapest authenticated call: count offers.
    pub async fn verify_credentials(&self) -> Result<RecordCount, EmagError> {
        self.count_records(Resource::ProductOffers, &ReadFilter::default())
            .await
    }

    async fn read_page_with_retry(
        &self,
        resource: Resource,
        page: u32,
        items_per_page: u32,
        filter: &ReadFilter,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<Value>, EmagError> {
        with_retry(
            &self.retry,
            || self.read_page(resource, page, items_per_page, filter),
            is_rate_limit_error,
            short_error_message,
            resource,
            page,
            on_progress,
        )
        .await
    }
}

fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Filter fields understood by `resource`; the date filter is dropped for
/// resources that cannot use it.
fn filter_body(resource: Resource, filter: &ReadFilter) -> Map<String, Value> {
    let mut body = Map::new();
    if resource.supports_date_filter()
        && let Some(ts) = filter.created_after
    {
        body.insert("createdAfter".to_string(), json!(format_emag_date(ts)));
    }
    body
}

#[async_trait]
impl MarketplaceClient for EmagClient {
    fn integration_id(&self) -> Uuid {
        self.integration_id
    }

    async fn count(&self, resource: Resource, filter: &ReadFilter) -> platform::Result<RecordCount> {
        with_retry(
            &self.retry,
            || self.count_records(resource, filter),
            is_rate_limit_error,
            short_error_message,
            resource,
            0,
            None,
        )
        .await
        .map_err(Into::into)
    }

    async fn read_orders(
        &self,
        page: u32,
        items_per_page: u32,
        filter: &ReadFilter,
        on_progress: Option<&ProgressCallback>,
    ) -> platform::Result<Vec<PlatformOrder>> {
        let raw = self
            .read_page_with_retry(Resource::Orders, page, items_per_page, filter, on_progress)
            .await?;
        raw.into_iter()
            .map(|item| to_platform_order(item).map_err(Into::into))
            .collect()
    }

    async fn read_offers(
        &self,
        page: u32,
        items_per_page: u32,
        on_progress: Option<&ProgressCallback>,
    ) -> platform::Result<Vec<PlatformOffer>> {
        let raw = self
            .read_page_with_retry(
                Resource::ProductOffers,
                page,
                items_per_page,
                &ReadFilter::default(),
                on_progress,
            )
            .await?;
        raw.into_iter()
            .map(|item| to_platform_offer(item).map_err(Into::into))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockTransport};
    use crate::platform::PlatformError;
    use chrono::NaiveDate;

    const BASE: &str = "https://marketplace-api.test/api-3";

    fn client(transport: &MockTransport) -> EmagClient {
        EmagClient::new_with_transport(
            Uuid::new_v4(),
            BASE,
            "seller@shop.ro",
            "s3cret",
            &EmagClientOptions {
                orders_rps: 1000,
                default_rps: 1000,
                retry: RetryPolicy::none(),
                ..EmagClientOptions::default()
            },
            Arc::new(transport.clone()),
        )
    }

    fn ok(results: Value) -> Value {
        json!({ "isError": false, "messages": [], "results": results })
    }

    fn request_body(transport: &MockTransport, index: usize) -> Value {
        let requests = transport.requests();
        serde_json::from_slice(&requests[index].body).expect("json body")
    }

    #[test]
    fn basic_auth_encodes_credentials() {
        assert_eq!(basic_auth("user", "pass"), "Basic dXNlcjpwYXNz");
    }

    #[tokio::test]
    async fn count_sends_created_after_for_orders() {
        let transport = MockTransport::new();
        transport.respond_json(
            format!("{BASE}/order/count"),
            ok(json!({"noOfItems": "42", "noOfPages": "1"})),
        );
        let since = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();

        let count = client(&transport)
            .count_records(Resource::Orders, &ReadFilter::created_after(since))
            .await
            .expect("count");

        assert_eq!(count, RecordCount { items: 42, pages: 1 });
        let body = request_body(&transport, 0);
        assert_eq!(body["createdAfter"], "2025-03-01 08:30:00");

        let requests = transport.requests();
        let auth = requests[0].header("Authorization");
        assert!(auth.is_some_and(|v| v.starts_with("Basic ")));
    }

    #[tokio::test]
    async fn offers_never_carry_a_date_filter() {
        let transport = MockTransport::new();
        transport.respond_json(format!("{BASE}/product_offer/read"), ok(json!([])));
        let since = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let page = client(&transport)
            .read_page(Resource::ProductOffers, 2, 500, &ReadFilter::created_after(since))
            .await
            .expect("read");

        assert!(page.is_empty());
        let body = request_body(&transport, 0);
        assert!(body.get("createdAfter").is_none());
        assert_eq!(body["currentPage"], 2);
        assert_eq!(body["itemsPerPage"], 100);
    }

    #[tokio::test]
    async fn is_error_envelope_is_rejected_even_on_200() {
        let transport = MockTransport::new();
        transport.respond_json(
            format!("{BASE}/order/count"),
            json!({"isError": true, "messages": ["Invalid vendor ip [1.2.3.4]"]}),
        );

        let err = client(&transport)
            .count_records(Resource::Orders, &ReadFilter::default())
            .await
            .expect_err("rejected");
        assert!(matches!(err, EmagError::Rejected(m) if m.contains("Invalid vendor ip")));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_required() {
        let transport = MockTransport::new();
        transport.respond(
            format!("{BASE}/product_offer/count"),
            HttpResponse {
                body: b"Unauthorized".to_vec(),
                ..HttpResponse::status(401)
            },
        );

        let err = client(&transport)
            .count(Resource::ProductOffers, &ReadFilter::default())
            .await
            .expect_err("unauthorized");
        assert!(matches!(err, PlatformError::AuthRequired));
    }

    #[tokio::test]
    async fn too_many_requests_reads_retry_after() {
        let transport = MockTransport::new();
        transport.respond(
            format!("{BASE}/order/read"),
            HttpResponse {
                retry_after_secs: Some(3),
                ..HttpResponse::status(429)
            },
        );

        let err = client(&transport)
            .read_page(Resource::Orders, 1, 100, &ReadFilter::default())
            .await
            .expect_err("limited");
        assert!(matches!(
            err,
            EmagError::RateLimited {
                retry_after_secs: Some(3)
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_page_is_retried() {
        let transport = MockTransport::new();
        let url = format!("{BASE}/order/read");
        transport.respond(
            url.clone(),
            HttpResponse::status(429),
        );
        transport.respond_json(
            url,
            ok(json!([{
                "id": 1,
                "status": 4,
                "type": 3,
                "date": "2025-03-01 10:00:00",
                "products": [{"quantity": 1, "sale_price": "20.00", "currency": "RON"}]
            }])),
        );

        let client = EmagClient::new_with_transport(
            Uuid::new_v4(),
            BASE,
            "u",
            "p",
            &EmagClientOptions {
                orders_rps: 1000,
                ..EmagClientOptions::default()
            },
            Arc::new(transport.clone()),
        );
        let orders = client
            .read_orders(1, 100, &ReadFilter::default(), None)
            .await
            .expect("second attempt succeeds");

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].emag_id, 1);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn malformed_record_fails_the_page() {
        let transport = MockTransport::new();
        transport.respond_json(
            format!("{BASE}/order/read"),
            ok(json!([{"id": 1, "date": "not a date"}])),
        );

        let err = client(&transport)
            .read_orders(1, 100, &ReadFilter::default(), None)
            .await
            .expect_err("bad record");
        assert!(matches!(err, PlatformError::Decode { .. }));
    }

    #[tokio::test]
    async fn missing_results_is_a_decode_error() {
        let transport = MockTransport::new();
        transport.respond_json(
            format!("{BASE}/order/count"),
            json!({"isError": false, "messages": []}),
        );

        let err = client(&transport)
            .count_records(Resource::Orders, &ReadFilter::default())
            .await
            .expect_err("no results");
        assert!(matches!(err, EmagError::Decode(_)));
    }
}
