//! Delivery route planning: greedy nearest-neighbor tours from a fixed
//! warehouse, plus distance-based delivery-zone classification.
//!
//! The tour construction is a heuristic, not an exact TSP solve; for
//! batches capped at [`MAX_STOPS_PER_ROUTE`] stops it is cheap and
//! produces a reasonable, deterministic plan. Equidistant candidates
//! are implementation-defined: the first minimal distance found in
//! input order wins.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{GeoPoint, Location};
use crate::errors::EngineResult;
use crate::store::DeliveryStore;

/// Mean Earth radius, kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;
/// Assumed courier speed.
pub const DEFAULT_SPEED_KMH: f64 = 30.0;
/// Handover time per stop, minutes.
pub const DEFAULT_STOP_SERVICE_MINUTES: f64 = 5.0;
/// Tour size cap; larger batches are split into separate routes.
pub const MAX_STOPS_PER_ROUTE: usize = 15;

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub location: Location,
    /// 1-based position in the tour.
    pub sequence: u32,
    pub distance_from_previous_km: f64,
    pub estimated_arrival: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizedRoute {
    pub stops: Vec<RouteStop>,
    /// Warehouse to last stop and back, kilometers.
    pub total_distance_km: f64,
    pub total_duration_minutes: f64,
}

impl OptimizedRoute {
    pub fn empty() -> Self {
        Self { stops: Vec::new(), total_distance_km: 0.0, total_duration_minutes: 0.0 }
    }
}

/// One band of the distance partition. Bands are contiguous and
/// exhaustive over `[0, inf)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeliveryZone {
    pub name: &'static str,
    pub min_distance_km: f64,
    pub max_distance_km: f64,
    pub delivery_fee: Decimal,
    pub estimated_days: u32,
}

/// Fixed, ordered partition of distance-from-warehouse.
pub fn delivery_zones() -> Vec<DeliveryZone> {
    vec![
        DeliveryZone {
            name: "Inner City",
            min_distance_km: 0.0,
            max_distance_km: 10.0,
            delivery_fee: Decimal::ZERO,
            estimated_days: 1,
        },
        DeliveryZone {
            name: "Greater Metro",
            min_distance_km: 10.0,
            max_distance_km: 50.0,
            delivery_fee: Decimal::from(15),
            estimated_days: 2,
        },
        DeliveryZone {
            name: "Regional",
            min_distance_km: 50.0,
            max_distance_km: 200.0,
            delivery_fee: Decimal::from(40),
            estimated_days: 3,
        },
        DeliveryZone {
            name: "National",
            min_distance_km: 200.0,
            max_distance_km: f64::INFINITY,
            delivery_fee: Decimal::from(90),
            estimated_days: 5,
        },
    ]
}

/// Tunable routing parameters; defaults match the production courier
/// profile.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingProfile {
    pub warehouse: GeoPoint,
    pub speed_kmh: f64,
    pub stop_service_minutes: f64,
    pub max_stops_per_route: usize,
}

impl Default for RoutingProfile {
    fn default() -> Self {
        Self {
            warehouse: GeoPoint::new(35.6892, 51.3890),
            speed_kmh: DEFAULT_SPEED_KMH,
            stop_service_minutes: DEFAULT_STOP_SERVICE_MINUTES,
            max_stops_per_route: MAX_STOPS_PER_ROUTE,
        }
    }
}

pub struct RouteOptimizer<S> {
    store: Arc<S>,
    profile: RoutingProfile,
}

impl<S: DeliveryStore> RouteOptimizer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store, profile: RoutingProfile::default() }
    }

    pub fn with_profile(mut self, profile: RoutingProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn profile(&self) -> &RoutingProfile {
        &self.profile
    }

    /// Greedy nearest-neighbor tour over the given locations, starting
    /// and ending at the warehouse.
    pub fn optimize_route(
        &self,
        locations: Vec<Location>,
        departure: DateTime<Utc>,
    ) -> OptimizedRoute {
        optimize_route(&self.profile, locations, departure)
    }

    /// Split a day's pending, geocoded orders into chunks of at most
    /// `max_stops_per_route` and plan each chunk as its own tour, so
    /// every route stays assignable to a single courier.
    pub async fn routes_for_date(
        &self,
        date: NaiveDate,
        departure: DateTime<Utc>,
    ) -> EngineResult<Vec<OptimizedRoute>> {
        let pending = self.store.pending_deliveries(date).await?;
        let routes = pending
            .chunks(self.profile.max_stops_per_route.max(1))
            .map(|chunk| optimize_route(&self.profile, chunk.to_vec(), departure))
            .collect();
        Ok(routes)
    }

    /// Classify a point into its delivery zone by warehouse distance.
    pub fn delivery_zone(&self, point: GeoPoint) -> DeliveryZone {
        zone_for_distance(haversine_km(self.profile.warehouse, point))
    }

    /// Promise date: now plus the zone's estimated whole days.
    pub fn estimate_delivery_date(&self, point: GeoPoint, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(i64::from(self.delivery_zone(point).estimated_days))
    }
}

pub fn optimize_route(
    profile: &RoutingProfile,
    locations: Vec<Location>,
    departure: DateTime<Utc>,
) -> OptimizedRoute {
    if locations.is_empty() {
        return OptimizedRoute::empty();
    }

    let mut unvisited = locations;
    let mut stops: Vec<RouteStop> = Vec::with_capacity(unvisited.len());
    let mut position = profile.warehouse;
    let mut total_distance = 0.0;
    let mut elapsed_minutes = 0.0;

    while !unvisited.is_empty() {
        // First minimal distance in input order wins; deliberate
        // implementation-defined tie-break.
        let mut nearest = 0;
        let mut nearest_distance = haversine_km(position, unvisited[0].point);
        for (i, candidate) in unvisited.iter().enumerate().skip(1) {
            let distance = haversine_km(position, candidate.point);
            if distance < nearest_distance {
                nearest = i;
                nearest_distance = distance;
            }
        }

        let location = unvisited.remove(nearest);
        position = location.point;
        total_distance += nearest_distance;
        elapsed_minutes +=
            nearest_distance / profile.speed_kmh * 60.0 + profile.stop_service_minutes;

        stops.push(RouteStop {
            location,
            sequence: stops.len() as u32 + 1,
            distance_from_previous_km: nearest_distance,
            estimated_arrival: departure
                + Duration::milliseconds((elapsed_minutes * 60_000.0) as i64),
        });
    }

    total_distance += haversine_km(position, profile.warehouse);
    let total_duration = total_distance / profile.speed_kmh * 60.0
        + profile.stop_service_minutes * stops.len() as f64;

    OptimizedRoute {
        stops,
        total_distance_km: total_distance,
        total_duration_minutes: total_duration,
    }
}

/// First zone whose `[min, max)` band contains the distance; the last
/// zone absorbs anything the scan misses at the open upper bound.
pub fn zone_for_distance(distance_km: f64) -> DeliveryZone {
    let zones = delivery_zones();
    let last = zones.len() - 1;
    for zone in &zones[..last] {
        if distance_km >= zone.min_distance_km && distance_km < zone.max_distance_km {
            return zone.clone();
        }
    }
    zones[last].clone()
}
