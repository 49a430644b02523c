// Distance resolution with an in-process TTL cache.
//
// Providers are tried in order until one succeeds; every failure is logged
// and counted, and only full exhaustion surfaces as an error. Cache entries
// are keyed by the unordered normalized postcode pair, so A->B and B->A
// share one entry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::BookingConfig;
use crate::metrics::ServiceMetrics;
use crate::pricing::error::PricingError;
use crate::pricing::providers::{
    DistanceProvider, DistanceResult, MatrixDistanceProvider, OfflineDistanceEstimator,
    RoutedDistanceProvider,
};
use crate::validation::normalize_postcode;

struct CachedDistance {
    result: DistanceResult,
    cached_at: DateTime<Utc>,
}

pub struct DistanceResolver {
    providers: Vec<Arc<dyn DistanceProvider>>,
    cache: RwLock<HashMap<String, CachedDistance>>,
    ttl: chrono::Duration,
    metrics: ServiceMetrics,
}

impl DistanceResolver {
    pub fn new(
        providers: Vec<Arc<dyn DistanceProvider>>,
        ttl: std::time::Duration,
        metrics: ServiceMetrics,
    ) -> Self {
        Self {
            providers,
            cache: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(24)),
            metrics,
        }
    }

    /// Standard chain: geocoded routing, then the matrix API when a key is
    /// configured, then the offline estimator.
    pub fn from_config(config: &BookingConfig, metrics: ServiceMetrics) -> Self {
        let mut providers: Vec<Arc<dyn DistanceProvider>> = vec![Arc::new(
            RoutedDistanceProvider::new(
                config.postcode_api_url.clone(),
                config.osrm_base_url.clone(),
                config.provider_timeout,
            ),
        )];
        if let Some(key) = &config.matrix_api_key {
            providers.push(Arc::new(MatrixDistanceProvider::new(
                key.clone(),
                config.provider_timeout,
            )));
        }
        providers.push(Arc::new(OfflineDistanceEstimator::new(
            config.base_postcode.clone(),
        )));
        Self::new(providers, config.distance_cache_ttl, metrics)
    }

    /// Offline-only resolver for tests and network-free local runs.
    pub fn offline_only(config: &BookingConfig, metrics: ServiceMetrics) -> Self {
        Self::new(
            vec![Arc::new(OfflineDistanceEstimator::new(
                config.base_postcode.clone(),
            ))],
            config.distance_cache_ttl,
            metrics,
        )
    }

    fn cache_key(from: &str, to: &str) -> String {
        let (a, b) = (normalize_postcode(from), normalize_postcode(to));
        if a <= b {
            format!("{}|{}", a, b)
        } else {
            format!("{}|{}", b, a)
        }
    }

    pub async fn resolve(&self, from: &str, to: &str) -> Result<DistanceResult, PricingError> {
        let _timer = self.metrics.start_distance_resolution();
        let key = Self::cache_key(from, to);

        if let Some(hit) = self.cached(&key).await {
            self.metrics.record_cache_hit();
            return Ok(hit);
        }
        self.metrics.record_cache_miss();

        for provider in &self.providers {
            match provider.distance(from, to).await {
                Ok(result) => {
                    tracing::debug!(
                        "Resolved distance {} -> {}: {} km via {}",
                        from,
                        to,
                        result.distance_km,
                        result.provider
                    );
                    self.cache.write().await.insert(
                        key,
                        CachedDistance {
                            result: result.clone(),
                            cached_at: Utc::now(),
                        },
                    );
                    return Ok(result);
                }
                Err(e) => {
                    self.metrics.record_provider_failure();
                    tracing::warn!("Distance provider {} failed: {:#}", provider.name(), e);
                }
            }
        }

        tracing::error!("All distance providers failed for {} -> {}", from, to);
        Err(PricingError::DistanceUnavailable)
    }

    async fn cached(&self, key: &str) -> Option<DistanceResult> {
        let cache = self.cache.read().await;
        cache
            .get(key)
            .filter(|entry| Utc::now() - entry.cached_at < self.ttl)
            .map(|entry| entry.result.clone())
    }

    #[cfg(test)]
    async fn insert_cached_at(&self, from: &str, to: &str, result: DistanceResult, cached_at: DateTime<Utc>) {
        self.cache
            .write()
            .await
            .insert(Self::cache_key(from, to), CachedDistance { result, cached_at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        fail: bool,
        km: rust_decimal::Decimal,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn ok(km: rust_decimal::Decimal) -> Arc<Self> {
            Arc::new(Self {
                fail: false,
                km,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                km: dec!(0),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DistanceProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn distance(&self, _from: &str, _to: &str) -> anyhow::Result<DistanceResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("stub provider down");
            }
            Ok(DistanceResult {
                distance_km: self.km,
                duration_minutes: 10,
                provider: "stub",
            })
        }
    }

    fn resolver_with(providers: Vec<Arc<dyn DistanceProvider>>) -> DistanceResolver {
        DistanceResolver::new(
            providers,
            std::time::Duration::from_secs(24 * 60 * 60),
            ServiceMetrics::new(),
        )
    }

    #[tokio::test]
    async fn falls_through_to_next_provider_on_failure() {
        let failing = StubProvider::failing();
        let healthy = StubProvider::ok(dec!(9.30));
        let providers: Vec<Arc<dyn DistanceProvider>> = vec![failing.clone(), healthy.clone()];
        let resolver = resolver_with(providers);

        let result = resolver.resolve("BS1 4DJ", "BA2 4AB").await.unwrap();
        assert_eq!(result.distance_km, dec!(9.30));
        assert_eq!(failing.call_count(), 1);
        assert_eq!(healthy.call_count(), 1);
    }

    #[tokio::test]
    async fn exhausting_all_providers_is_an_error() {
        let providers: Vec<Arc<dyn DistanceProvider>> =
            vec![StubProvider::failing(), StubProvider::failing()];
        let resolver = resolver_with(providers);
        let err = resolver.resolve("BS1 4DJ", "BA2 4AB").await.unwrap_err();
        assert!(matches!(err, PricingError::DistanceUnavailable));
    }

    #[tokio::test]
    async fn second_lookup_hits_the_cache() {
        let provider = StubProvider::ok(dec!(12.00));
        let providers: Vec<Arc<dyn DistanceProvider>> = vec![provider.clone()];
        let resolver = resolver_with(providers);

        resolver.resolve("BS1 4DJ", "BA2 4AB").await.unwrap();
        resolver.resolve("BS1 4DJ", "BA2 4AB").await.unwrap();
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn cache_key_ignores_direction_and_formatting() {
        let provider = StubProvider::ok(dec!(12.00));
        let providers: Vec<Arc<dyn DistanceProvider>> = vec![provider.clone()];
        let resolver = resolver_with(providers);

        resolver.resolve("BS1 4DJ", "BA2 4AB").await.unwrap();
        resolver.resolve("ba24ab", "bs1 4dj").await.unwrap();
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_refreshed() {
        let provider = StubProvider::ok(dec!(12.00));
        let providers: Vec<Arc<dyn DistanceProvider>> = vec![provider.clone()];
        let resolver = resolver_with(providers);

        resolver
            .insert_cached_at(
                "BS1 4DJ",
                "BA2 4AB",
                DistanceResult {
                    distance_km: dec!(99.00),
                    duration_minutes: 99,
                    provider: "stale",
                },
                Utc::now() - chrono::Duration::hours(25),
            )
            .await;

        let result = resolver.resolve("BS1 4DJ", "BA2 4AB").await.unwrap();
        assert_eq!(result.distance_km, dec!(12.00));
        assert_eq!(provider.call_count(), 1);
    }
}
