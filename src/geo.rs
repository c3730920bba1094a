use crate::config::ApiConfig;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Best-effort location lookup used to enrich alert bodies. Failure is
/// silently tolerated; the alert goes out without location text.
#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn locate(&self) -> Option<String>;
}

/// Locator that never resolves; used when no endpoint is configured.
pub struct NoGeoLocator;

#[async_trait]
impl GeoLocator for NoGeoLocator {
    async fn locate(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

/// Locator backed by an ip-geolocation style endpoint returning
/// `{city, country}` JSON.
pub struct HttpGeoLocator {
    client: reqwest::Client,
    url: String,
}

impl HttpGeoLocator {
    pub fn new(api: &ApiConfig, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: api.geolocation_url.clone(),
        }
    }
}

#[async_trait]
impl GeoLocator for HttpGeoLocator {
    async fn locate(&self) -> Option<String> {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Geolocation lookup failed: {}", e);
                return None;
            }
        };

        let geo: GeoResponse = match response.json().await {
            Ok(geo) => geo,
            Err(e) => {
                debug!("Geolocation response unreadable: {}", e);
                return None;
            }
        };

        match (geo.city, geo.country) {
            (Some(city), Some(country)) => Some(format!("{}, {}", city, country)),
            (Some(city), None) => Some(city),
            (None, Some(country)) => Some(country),
            (None, None) => None,
        }
    }
}

/// Append location text to an alert body when available.
pub fn enrich_body(body: &str, location: Option<&str>) -> String {
    match location {
        Some(location) => format!("{} Approximate location: {}.", body, location),
        None => body.to_string(),
    }
}
