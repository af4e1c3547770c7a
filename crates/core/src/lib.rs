pub mod config;
pub mod domain;
pub mod errors;
pub mod fanout;
pub mod pricing;
pub mod recs;
pub mod routing;
pub mod sales;
pub mod segments;
pub mod store;

pub use config::{ConfigError, ConfigOverrides, EngineConfig, LoadOptions, LogFormat};
pub use domain::{
    CoPurchaseOrder, CustomerOrderStats, GeoPoint, Location, OrderId, OrderLineFact, OrderStatus,
    ProductId, ProductQuery, ProductSnapshot, PurchasedLine, UserId,
};
pub use errors::{EngineError, EngineResult, StoreError};
pub use fanout::{map_bounded, try_map_bounded};
pub use pricing::{
    DynamicPriceRecommendation, ExpectedImpact, PricingEngine, PricingFactors,
};
pub use recs::{RecommendationEngine, RecommendationReason, RecommendationScore};
pub use routing::{
    delivery_zones, haversine_km, optimize_route, DeliveryZone, OptimizedRoute, RouteOptimizer,
    RouteStop, RoutingProfile,
};
pub use sales::{DemandForecast, DemandForecaster, SalesDataPoint, SalesHistory, StockUrgency};
pub use segments::{CustomerSegmenter, RfmSegment, SegmentLabel};
pub use store::{
    CatalogStore, CommerceStore, CustomerStore, DeliveryStore, OrderStore, SalesStore,
};
