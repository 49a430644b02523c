use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::bookings::models::PriceBreakdown;
use crate::config::BookingConfig;
use crate::models::{DetailingService, VehicleSize};
use crate::pricing::distance::DistanceResolver;
use crate::pricing::error::PricingError;
use crate::pricing::providers::DistanceResult;
use crate::store::CatalogStore;

/// One priced service line. The surcharge is the full travel surcharge for
/// the visit; when several lines are booked together the booking applies it
/// once, not per line.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PriceCalculation {
    pub service_id: Uuid,
    pub service_name: String,
    pub vehicle_size: VehicleSize,
    pub base_price: Decimal,
    pub distance_surcharge: Decimal,
    pub total: Decimal,
    pub distance_km: Option<Decimal>,
    pub duration_minutes: i32,
}

/// Computes quotes from the service catalogue, the vehicle tier and the
/// travel distance. All arithmetic is Decimal; money never touches floats.
pub struct PricingEngine {
    catalog: Arc<dyn CatalogStore>,
    resolver: Arc<DistanceResolver>,
    config: Arc<BookingConfig>,
}

impl PricingEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        resolver: Arc<DistanceResolver>,
        config: Arc<BookingConfig>,
    ) -> Self {
        Self {
            catalog,
            resolver,
            config,
        }
    }

    /// Travel surcharge for a one-way distance: the configured free radius
    /// costs nothing, every km past it is charged at the per-km rate, and
    /// the result rounds half-away-from-zero to pennies.
    pub fn distance_surcharge(&self, distance_km: Decimal) -> Decimal {
        let chargeable = (distance_km - self.config.free_radius_km).max(Decimal::ZERO);
        (chargeable * self.config.surcharge_per_km)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Price a single catalogue row for a tier. Missing or non-positive tier
    /// prices are a configuration error, never treated as free.
    pub fn quote_service(
        &self,
        service: &DetailingService,
        size: VehicleSize,
        distance_km: Option<Decimal>,
    ) -> Result<PriceCalculation, PricingError> {
        let base_price = service.price_for(size).ok_or(PricingError::NotConfigured {
            service_id: service.id,
            tier: size,
        })?;
        let distance_surcharge = distance_km
            .map(|d| self.distance_surcharge(d))
            .unwrap_or(Decimal::ZERO);

        Ok(PriceCalculation {
            service_id: service.id,
            service_name: service.name.clone(),
            vehicle_size: size,
            base_price,
            distance_surcharge,
            total: base_price + distance_surcharge,
            distance_km,
            duration_minutes: service
                .duration_minutes
                .unwrap_or(self.config.default_service_duration_min as i32),
        })
    }

    /// Price a batch of services for one visit. The batch is atomic: if any
    /// service is unknown, inactive or unpriced for the tier, the whole
    /// quote fails and no partial list is returned.
    pub async fn quote_services(
        &self,
        service_ids: &[Uuid],
        size: VehicleSize,
        distance_km: Option<Decimal>,
    ) -> Result<Vec<PriceCalculation>, PricingError> {
        let services = self.catalog.services_by_ids(service_ids).await?;

        let mut calculations = Vec::with_capacity(service_ids.len());
        for id in service_ids {
            let service = services
                .iter()
                .find(|s| s.id == *id)
                .filter(|s| s.active)
                .ok_or(PricingError::ServiceNotFound(*id))?;
            calculations.push(self.quote_service(service, size, distance_km)?);
        }
        Ok(calculations)
    }

    /// Collapse per-line quotes into the amounts a booking stores. Base
    /// prices sum across lines; the travel surcharge is applied once per
    /// visit, not once per line.
    pub fn breakdown(
        &self,
        calculations: &[PriceCalculation],
        distance_km: Option<Decimal>,
    ) -> PriceBreakdown {
        let base_subtotal: Decimal = calculations.iter().map(|c| c.base_price).sum();
        let distance_surcharge = distance_km
            .map(|d| self.distance_surcharge(d))
            .unwrap_or(Decimal::ZERO);
        PriceBreakdown {
            base_subtotal,
            distance_surcharge,
            total: base_subtotal + distance_surcharge,
            distance_km,
        }
    }

    /// Resolve the travel distance for a customer postcode, then quote.
    pub async fn quote_for_postcode(
        &self,
        service_ids: &[Uuid],
        size: VehicleSize,
        postcode: &str,
    ) -> Result<(Vec<PriceCalculation>, DistanceResult), PricingError> {
        let distance = self
            .resolver
            .resolve(&self.config.base_postcode, postcode)
            .await?;
        let calculations = self
            .quote_services(service_ids, size, Some(distance.distance_km))
            .await?;
        Ok((calculations, distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ServiceMetrics;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn engine_with(store: MemoryStore) -> PricingEngine {
        let config = Arc::new(BookingConfig::default());
        let resolver = Arc::new(DistanceResolver::offline_only(
            &config,
            ServiceMetrics::new(),
        ));
        PricingEngine::new(Arc::new(store), resolver, config)
    }

    fn service(name: &str, medium: Option<Decimal>) -> DetailingService {
        DetailingService {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            duration_minutes: Some(60),
            active: true,
            price_small: Some(dec!(20.00)),
            price_medium: medium,
            price_large: Some(dec!(55.00)),
            price_extra_large: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn no_surcharge_inside_free_radius() {
        let engine = engine_with(MemoryStore::new());
        assert_eq!(engine.distance_surcharge(dec!(0)), dec!(0.00));
        assert_eq!(engine.distance_surcharge(dec!(3.2)), dec!(0.00));
        assert_eq!(engine.distance_surcharge(dec!(5)), dec!(0.00));
    }

    #[test]
    fn surcharge_charges_only_past_the_radius() {
        let engine = engine_with(MemoryStore::new());
        // 7 km with a 5 km radius: 2 chargeable km at 1.50.
        assert_eq!(engine.distance_surcharge(dec!(7)), dec!(3.00));
        // 12 km: 7 chargeable km at 1.50.
        assert_eq!(engine.distance_surcharge(dec!(12)), dec!(10.50));
    }

    #[test]
    fn surcharge_rounds_half_away_from_zero() {
        let engine = engine_with(MemoryStore::new());
        // 5.37 chargeable km * 1.50 = 8.055 -> 8.06
        assert_eq!(engine.distance_surcharge(dec!(10.37)), dec!(8.06));
        // 2.345 chargeable * 1.50 = 3.5175 -> 3.52
        assert_eq!(engine.distance_surcharge(dec!(7.345)), dec!(3.52));
    }

    #[test]
    fn quote_uses_the_tier_price() {
        let engine = engine_with(MemoryStore::new());
        let svc = service("Full Valet", Some(dec!(40.00)));

        let quote = engine
            .quote_service(&svc, VehicleSize::Medium, Some(dec!(12)))
            .unwrap();
        assert_eq!(quote.base_price, dec!(40.00));
        assert_eq!(quote.distance_surcharge, dec!(10.50));
        assert_eq!(quote.total, dec!(50.50));

        let quote = engine.quote_service(&svc, VehicleSize::Small, None).unwrap();
        assert_eq!(quote.base_price, dec!(20.00));
        assert_eq!(quote.distance_surcharge, dec!(0.00));
        assert_eq!(quote.total, dec!(20.00));
    }

    #[test]
    fn unpriced_tier_is_not_configured() {
        let engine = engine_with(MemoryStore::new());
        let svc = service("Full Valet", Some(dec!(40.00)));

        let err = engine
            .quote_service(&svc, VehicleSize::ExtraLarge, None)
            .unwrap_err();
        assert!(matches!(err, PricingError::NotConfigured { tier: VehicleSize::ExtraLarge, .. }));
    }

    #[tokio::test]
    async fn batch_quote_is_atomic() {
        let store = MemoryStore::new();
        let priced = service("Exterior Wash", Some(dec!(25.00)));
        let unpriced = service("Ceramic Coat", None);
        store.seed_service(priced.clone()).await;
        store.seed_service(unpriced.clone()).await;
        let engine = engine_with(store);

        let err = engine
            .quote_services(&[priced.id, unpriced.id], VehicleSize::Medium, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::NotConfigured { service_id, .. } if service_id == unpriced.id));

        // Both services carry a Small price, so that batch goes through.
        let quotes = engine
            .quote_services(&[priced.id, unpriced.id], VehicleSize::Small, None)
            .await
            .unwrap();
        assert_eq!(quotes.len(), 2);
    }

    #[tokio::test]
    async fn unknown_and_inactive_services_fail_the_batch() {
        let store = MemoryStore::new();
        let mut retired = service("Retired Package", Some(dec!(30.00)));
        retired.active = false;
        store.seed_service(retired.clone()).await;
        let engine = engine_with(store);

        let missing = Uuid::new_v4();
        let err = engine
            .quote_services(&[missing], VehicleSize::Medium, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::ServiceNotFound(id) if id == missing));

        let err = engine
            .quote_services(&[retired.id], VehicleSize::Medium, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::ServiceNotFound(id) if id == retired.id));
    }

    #[tokio::test]
    async fn booking_breakdown_applies_surcharge_once() {
        let store = MemoryStore::new();
        let valet = service("Full Valet", Some(dec!(40.00)));
        let wash = service("Exterior Wash", Some(dec!(25.00)));
        store.seed_service(valet.clone()).await;
        store.seed_service(wash.clone()).await;
        let engine = engine_with(store);

        let quotes = engine
            .quote_services(&[valet.id, wash.id], VehicleSize::Medium, Some(dec!(12)))
            .await
            .unwrap();
        let breakdown = engine.breakdown(&quotes, Some(dec!(12)));

        assert_eq!(breakdown.base_subtotal, dec!(65.00));
        assert_eq!(breakdown.distance_surcharge, dec!(10.50));
        assert_eq!(breakdown.total, dec!(75.50));
        assert_eq!(breakdown.distance_km, Some(dec!(12)));
    }

    #[tokio::test]
    async fn identical_inputs_produce_identical_quotes() {
        let store = MemoryStore::new();
        let svc = service("Full Valet", Some(dec!(40.00)));
        store.seed_service(svc.clone()).await;
        let engine = engine_with(store);

        let first = engine
            .quote_services(&[svc.id], VehicleSize::Medium, Some(dec!(9.80)))
            .await
            .unwrap();
        let second = engine
            .quote_services(&[svc.id], VehicleSize::Medium, Some(dec!(9.80)))
            .await
            .unwrap();
        assert_eq!(first[0].total, second[0].total);
        assert_eq!(first[0].distance_surcharge, second[0].distance_surcharge);
    }
}
