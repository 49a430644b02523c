// Distance providers.
//
// Each provider turns a postcode pair into a road distance. They sit behind
// the DistanceProvider trait so the resolver can walk a fallback chain:
// geocoding + routing first, a keyed matrix API second, and a deterministic
// offline estimate as the floor that cannot fail.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::validation::normalize_postcode;

/// A resolved road distance between two postcodes.
#[derive(Debug, Clone)]
pub struct DistanceResult {
    pub distance_km: Decimal,
    pub duration_minutes: i64,
    /// Which provider produced the figure.
    pub provider: &'static str,
}

impl DistanceResult {
    fn from_meters(meters: f64, seconds: f64, provider: &'static str) -> Self {
        Self {
            distance_km: Decimal::from_f64(meters / 1000.0)
                .unwrap_or(Decimal::ZERO)
                .round_dp(2),
            duration_minutes: (seconds / 60.0).round() as i64,
            provider,
        }
    }
}

#[async_trait]
pub trait DistanceProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn distance(&self, from: &str, to: &str) -> anyhow::Result<DistanceResult>;
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent("detailing-api/0.1")
        .build()
        .expect("failed to build HTTP client")
}

/// Primary provider: free postcode geocoding (postcodes.io) followed by an
/// OSRM driving route between the two coordinates.
pub struct RoutedDistanceProvider {
    client: reqwest::Client,
    postcode_api_url: String,
    osrm_base_url: String,
}

impl RoutedDistanceProvider {
    pub fn new(postcode_api_url: String, osrm_base_url: String, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            postcode_api_url,
            osrm_base_url,
        }
    }

    /// Look up (latitude, longitude) for a postcode.
    async fn geocode(&self, postcode: &str) -> anyhow::Result<(f64, f64)> {
        #[derive(Deserialize)]
        struct PostcodeLookup {
            result: Option<PostcodePoint>,
        }
        #[derive(Deserialize)]
        struct PostcodePoint {
            latitude: f64,
            longitude: f64,
        }

        let url = format!(
            "{}/postcodes/{}",
            self.postcode_api_url,
            normalize_postcode(postcode)
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("postcode lookup request failed")?;
        if !response.status().is_success() {
            bail!("postcode lookup returned {}", response.status());
        }
        let body: PostcodeLookup = response
            .json()
            .await
            .context("postcode lookup returned malformed JSON")?;
        let point = body
            .result
            .with_context(|| format!("postcode {} not found", postcode))?;
        Ok((point.latitude, point.longitude))
    }

    async fn route(&self, from: (f64, f64), to: (f64, f64)) -> anyhow::Result<(f64, f64)> {
        #[derive(Deserialize)]
        struct RouteResponse {
            code: String,
            #[serde(default)]
            routes: Vec<Route>,
        }
        #[derive(Deserialize)]
        struct Route {
            distance: f64,
            duration: f64,
        }

        // OSRM wants lon,lat pairs.
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.osrm_base_url, from.1, from.0, to.1, to.0
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("routing request failed")?;
        if !response.status().is_success() {
            bail!("routing service returned {}", response.status());
        }
        let body: RouteResponse = response
            .json()
            .await
            .context("routing service returned malformed JSON")?;
        if body.code != "Ok" {
            bail!("routing service reported code {}", body.code);
        }
        let route = body
            .routes
            .first()
            .context("routing service returned no routes")?;
        Ok((route.distance, route.duration))
    }
}

#[async_trait]
impl DistanceProvider for RoutedDistanceProvider {
    fn name(&self) -> &'static str {
        "postcodes-osrm"
    }

    async fn distance(&self, from: &str, to: &str) -> anyhow::Result<DistanceResult> {
        let (from_point, to_point) = tokio::try_join!(self.geocode(from), self.geocode(to))?;
        let (meters, seconds) = self.route(from_point, to_point).await?;
        Ok(DistanceResult::from_meters(meters, seconds, self.name()))
    }
}

const MATRIX_API_URL: &str = "https://api.distancematrix.ai/maps/api/distancematrix/json";

/// Secondary provider: a commercial distance-matrix API. Only enabled when an
/// API key is configured.
pub struct MatrixDistanceProvider {
    client: reqwest::Client,
    api_key: String,
}

impl MatrixDistanceProvider {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key,
        }
    }
}

#[async_trait]
impl DistanceProvider for MatrixDistanceProvider {
    fn name(&self) -> &'static str {
        "distance-matrix"
    }

    async fn distance(&self, from: &str, to: &str) -> anyhow::Result<DistanceResult> {
        #[derive(Deserialize)]
        struct MatrixResponse {
            #[serde(default)]
            rows: Vec<MatrixRow>,
        }
        #[derive(Deserialize)]
        struct MatrixRow {
            #[serde(default)]
            elements: Vec<MatrixElement>,
        }
        #[derive(Deserialize)]
        struct MatrixElement {
            status: String,
            distance: Option<MatrixValue>,
            duration: Option<MatrixValue>,
        }
        #[derive(Deserialize)]
        struct MatrixValue {
            value: f64,
        }

        let response = self
            .client
            .get(MATRIX_API_URL)
            .query(&[
                ("origins", from),
                ("destinations", to),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("distance matrix request failed")?;
        if !response.status().is_success() {
            bail!("distance matrix returned {}", response.status());
        }
        let body: MatrixResponse = response
            .json()
            .await
            .context("distance matrix returned malformed JSON")?;
        let element = body
            .rows
            .first()
            .and_then(|row| row.elements.first())
            .context("distance matrix returned no elements")?;
        if element.status != "OK" {
            bail!("distance matrix element status {}", element.status);
        }
        let meters = element
            .distance
            .as_ref()
            .context("distance matrix element missing distance")?
            .value;
        let seconds = element.duration.as_ref().map(|d| d.value).unwrap_or(0.0);
        Ok(DistanceResult::from_meters(meters, seconds, self.name()))
    }
}

/// Rough straight-line estimates from the Bristol base by postcode area.
/// Close enough for a travel surcharge when both real providers are down.
const AREA_ESTIMATES_KM: &[(&str, f64)] = &[
    ("BS", 6.0),
    ("BA", 20.0),
    ("GL", 38.0),
    ("SN", 42.0),
    ("TA", 45.0),
    ("NP", 32.0),
    ("CF", 48.0),
    ("EX", 80.0),
    ("SP", 60.0),
    ("DT", 70.0),
];

const DEFAULT_ESTIMATE_KM: f64 = 25.0;
const ESTIMATE_SPEED_KMH: f64 = 40.0;

/// Last-resort provider: deterministic offline estimate keyed on the
/// destination postcode area. Never fails, so the chain always terminates
/// with a usable figure.
pub struct OfflineDistanceEstimator {
    base_postcode: String,
}

impl OfflineDistanceEstimator {
    pub fn new(base_postcode: String) -> Self {
        Self { base_postcode }
    }

    fn area(postcode: &str) -> String {
        normalize_postcode(postcode)
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect()
    }

    fn estimate_km(&self, to: &str) -> f64 {
        if normalize_postcode(to) == normalize_postcode(&self.base_postcode) {
            return 0.0;
        }
        let area = Self::area(to);
        AREA_ESTIMATES_KM
            .iter()
            .find(|(prefix, _)| *prefix == area)
            .map(|(_, km)| *km)
            .unwrap_or(DEFAULT_ESTIMATE_KM)
    }
}

#[async_trait]
impl DistanceProvider for OfflineDistanceEstimator {
    fn name(&self) -> &'static str {
        "offline-estimate"
    }

    async fn distance(&self, _from: &str, to: &str) -> anyhow::Result<DistanceResult> {
        let km = self.estimate_km(to);
        let minutes = (km / ESTIMATE_SPEED_KMH * 60.0).round() as i64;
        Ok(DistanceResult {
            distance_km: Decimal::from_f64(km).unwrap_or(Decimal::ZERO).round_dp(2),
            duration_minutes: minutes,
            provider: self.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn offline_estimate_is_deterministic() {
        let estimator = OfflineDistanceEstimator::new("BS1 4DJ".to_string());
        let first = estimator.distance("BS1 4DJ", "BA1 1AA").await.unwrap();
        let second = estimator.distance("BS1 4DJ", "ba11aa").await.unwrap();
        assert_eq!(first.distance_km, second.distance_km);
        assert_eq!(first.distance_km, dec!(20.00));
        assert_eq!(first.provider, "offline-estimate");
    }

    #[tokio::test]
    async fn offline_estimate_falls_back_to_default_area() {
        let estimator = OfflineDistanceEstimator::new("BS1 4DJ".to_string());
        let result = estimator.distance("BS1 4DJ", "ZZ9 9ZZ").await.unwrap();
        assert_eq!(result.distance_km, dec!(25.00));
    }

    #[tokio::test]
    async fn offline_estimate_same_postcode_is_zero() {
        let estimator = OfflineDistanceEstimator::new("BS1 4DJ".to_string());
        let result = estimator.distance("BS1 4DJ", "bs14dj").await.unwrap();
        assert_eq!(result.distance_km, Decimal::ZERO);
        assert_eq!(result.duration_minutes, 0);
    }

    #[test]
    fn meters_convert_to_rounded_km() {
        let result = DistanceResult::from_meters(12345.0, 900.0, "test");
        assert_eq!(result.distance_km, dec!(12.35));
        assert_eq!(result.duration_minutes, 15);
    }
}
