use std::time::Duration;

use reqwest::{
    Client, ClientBuilder, StatusCode, Url,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::domain::DsmrReading;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid API configuration: {0}")]
    Configuration(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("the datalogger has not accepted any reading yet")]
    Empty,
}

/// DSMR-reader API client, authenticated with the `X-AUTHKEY` header.
///
/// `base_url` is the API root, e.g. `https://dsmr.local/api/v2/`.
pub struct ApiClient {
    client: Client,
    reading_url: Url,
    consumption_url: Url,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        auth_key: &str,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Configuration(format!("invalid base URL: {e}")))?;
        let reading_url = base_url
            .join("datalogger/dsmrreading")
            .map_err(|e| ApiError::Configuration(format!("invalid base URL: {e}")))?;
        let consumption_url = base_url
            .join("consumption/electricity")
            .map_err(|e| ApiError::Configuration(format!("invalid base URL: {e}")))?;

        let mut auth_value = HeaderValue::from_str(auth_key)
            .map_err(|e| ApiError::Configuration(format!("invalid auth key: {e}")))?;
        auth_value.set_sensitive(true);
        let headers =
            HeaderMap::from_iter([(HeaderName::from_static("x-authkey"), auth_value)]);

        // The datalogger commonly runs behind a self-signed certificate.
        let client = ClientBuilder::new()
            .default_headers(headers)
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;

        Ok(Self { client, reading_url, consumption_url })
    }

    /// Posts one reading. Any HTTP response counts as delivered; the returned
    /// status code says whether the datalogger accepted it.
    pub async fn post_reading(&self, reading: &DsmrReading) -> Result<StatusCode, ApiError> {
        let response =
            self.client.post(self.reading_url.clone()).json(reading).send().await?;
        Ok(response.status())
    }

    /// Timestamp of the most recent reading the datalogger accepted.
    ///
    /// This is the staleness probe an external watchdog polls.
    pub async fn latest_read_at(&self) -> Result<OffsetDateTime, ApiError> {
        let page: ConsumptionPage = self
            .client
            .get(self.consumption_url.clone())
            .query(&[("ordering", "-read_at"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        page.results.into_iter().next().map(|entry| entry.read_at).ok_or(ApiError::Empty)
    }
}

#[derive(Debug, Deserialize)]
struct ConsumptionPage {
    results: Vec<ConsumptionEntry>,
}

#[derive(Debug, Deserialize)]
struct ConsumptionEntry {
    #[serde(with = "time::serde::rfc3339")]
    read_at: OffsetDateTime,
}
