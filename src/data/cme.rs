//! CME Group settlements API client.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tracing::debug;

use crate::calendar::format_request_date;
use crate::data::{FetchError, SettlementProvider};
use crate::domain::RawPayload;
use crate::error::{AppError, ErrorKind};

pub const DEFAULT_BASE_URL: &str = "https://www.cmegroup.com/CmeWS/mvc/Settlements/Futures/Settlements";
const PAGE_SIZE: &str = "500";

pub struct CmeClient {
    client: Client,
    base_url: String,
}

impl CmeClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("es-ES,es;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::new(ErrorKind::Config, format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, provider_id: &str) -> String {
        format!("{}/{provider_id}/FUT", self.base_url.trim_end_matches('/'))
    }
}

impl SettlementProvider for CmeClient {
    fn fetch(&self, provider_id: &str, date: NaiveDate) -> Result<RawPayload, FetchError> {
        let trade_date = format_request_date(date);
        // The endpoint expects a cache-busting millisecond stamp.
        let stamp = Utc::now().timestamp_millis().to_string();

        debug!(provider_id, trade_date = %trade_date, "Requesting settlements");

        let resp = self
            .client
            .get(self.url(provider_id))
            .query(&[
                ("strategy", "DEFAULT"),
                ("tradeDate", trade_date.as_str()),
                ("pageSize", PAGE_SIZE),
                ("isProtected", ""),
                ("_t", stamp.as_str()),
            ])
            .send()
            .map_err(|e| FetchError::Transport(format!("request for {provider_id} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(FetchError::Transport(format!(
                "request for {provider_id} failed with status {}",
                resp.status()
            )));
        }

        resp.json::<RawPayload>()
            .map_err(|e| FetchError::Decode(format!("settlements for {provider_id}: {e}")))
    }
}
