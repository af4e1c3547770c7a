//! Dynamic discount recommendations.
//!
//! A recommendation is computed from hand-tuned stock, age, elasticity,
//! and market-position factors, capped hard by margin protection, and is
//! never applied automatically: computing a discount and writing one
//! back to the catalog are two separate, explicit calls.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{ProductId, ProductQuery, ProductSnapshot};
use crate::errors::EngineResult;
use crate::fanout::try_map_bounded;
use crate::sales::forecast::RECENT_MEAN_DAYS;
use crate::sales::history::{aggregate_daily, window_start};
use crate::store::{CatalogStore, SalesStore};

/// Hard ceiling on any recommended discount, percent.
pub const MAX_DISCOUNT_PCT: u32 = 50;
/// Discount cap when the margin is under 10%.
pub const THIN_MARGIN_CAP_PCT: f64 = 5.0;
/// Discount cap when the margin is under 20%.
pub const MODEST_MARGIN_CAP_PCT: f64 = 15.0;
/// Assumed margin when the cost price is absent or non-positive.
pub const DEFAULT_MARGIN_PCT: f64 = 20.0;
/// Products considered per batch run.
pub const BATCH_PRODUCT_LIMIT: usize = 50;
/// Store-read fan-out width for the batch run.
pub const PRICING_FANOUT_WIDTH: usize = 5;

/// Demand elasticity by category: how strongly buyers in the category
/// respond to a discount. Beverages move on price; staples like oils
/// and canned goods barely do.
const CATEGORY_ELASTICITY: &[(&str, f64)] = &[
    ("beverages", 0.8),
    ("snacks", 0.7),
    ("dairy", 0.65),
    ("spices", 0.6),
    ("grains", 0.55),
    ("legumes", 0.5),
    ("canned", 0.4),
    ("oils", 0.35),
];
const DEFAULT_ELASTICITY: f64 = 0.5;

pub fn category_elasticity(category: &str) -> f64 {
    CATEGORY_ELASTICITY
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, value)| *value)
        .unwrap_or(DEFAULT_ELASTICITY)
}

/// Intermediate pricing signals, all derived per invocation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingFactors {
    /// 0-1: how badly the current stock outpaces the sales rate.
    pub stock_pressure: f64,
    /// 0-1: how long the product has sat in the catalog.
    pub age_multiplier: f64,
    /// 0-1: per-category responsiveness to discounts.
    pub demand_elasticity: f64,
    /// -1..1: price relative to the category average.
    pub market_position: f64,
    /// Percent; may be negative when selling below cost.
    pub profit_margin: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedImpact {
    Minor,
    Moderate,
    Significant,
}

impl ExpectedImpact {
    fn from_discount(discount_pct: u32) -> Self {
        if discount_pct > 30 {
            Self::Significant
        } else if discount_pct < 10 {
            Self::Minor
        } else {
            Self::Moderate
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DynamicPriceRecommendation {
    pub product_id: ProductId,
    pub product_name: String,
    pub current_price: Decimal,
    pub current_discount_pct: u32,
    pub recommended_price: Decimal,
    pub recommended_discount_pct: u32,
    pub expected_impact: ExpectedImpact,
    /// Ordered factor explanations for the admin console.
    pub reasoning: Vec<String>,
    /// 0-0.95.
    pub confidence: f64,
}

impl DynamicPriceRecommendation {
    /// How far the recommendation moves from the current discount.
    pub fn impact_delta(&self) -> u32 {
        self.recommended_discount_pct.abs_diff(self.current_discount_pct)
    }
}

pub fn stock_pressure(stock: u32, average_daily_sales: f64) -> f64 {
    if average_daily_sales <= 0.0 {
        // Nothing selling: only a real pile of stock creates pressure.
        return if stock > 50 { 0.8 } else { 0.1 };
    }
    let days_of_stock = f64::from(stock) / average_daily_sales;
    if days_of_stock > 60.0 {
        1.0
    } else if days_of_stock > 30.0 {
        0.7
    } else if days_of_stock > 14.0 {
        0.4
    } else {
        0.1
    }
}

pub fn age_multiplier(age_days: i64) -> f64 {
    if age_days > 90 {
        1.0
    } else if age_days > 60 {
        0.7
    } else if age_days > 30 {
        0.4
    } else {
        0.1
    }
}

pub fn market_position(price: Decimal, category_average: Option<Decimal>) -> f64 {
    match category_average {
        Some(average) if !average.is_zero() => ((price - average) / average)
            .to_f64()
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0),
        _ => 0.0,
    }
}

pub fn profit_margin_pct(price: Decimal, cost_price: Option<Decimal>) -> f64 {
    match cost_price {
        Some(cost) if cost > Decimal::ZERO && !price.is_zero() => {
            ((price - cost) / price).to_f64().unwrap_or(0.0) * 100.0
        }
        _ => DEFAULT_MARGIN_PCT,
    }
}

/// Weighted discount score with margin protection. Margin caps override
/// everything upstream: a thin margin holds the discount down no matter
/// how much stock or age pressure accumulated.
pub fn discount_score(factors: &PricingFactors) -> u32 {
    let mut score =
        factors.stock_pressure * 40.0 + factors.age_multiplier * 20.0 + factors.demand_elasticity * 15.0;
    if factors.market_position > 0.0 {
        score += factors.market_position * 15.0;
    }

    if factors.profit_margin < 10.0 {
        score = score.min(THIN_MARGIN_CAP_PCT);
    } else if factors.profit_margin < 20.0 {
        score = score.min(MODEST_MARGIN_CAP_PCT);
    }

    (score.round().max(0.0) as u32).min(MAX_DISCOUNT_PCT)
}

pub fn build_reasoning(factors: &PricingFactors) -> Vec<String> {
    let mut reasons = Vec::new();
    if factors.stock_pressure > 0.7 {
        reasons.push("Stock is piling up well beyond the current sales rate".to_owned());
    }
    if factors.age_multiplier > 0.5 {
        reasons.push("Product has been in the catalog for over two months".to_owned());
    }
    if factors.demand_elasticity > 0.6 {
        reasons.push("This category responds strongly to discounts".to_owned());
    }
    if factors.market_position > 0.3 {
        reasons.push("Priced noticeably above the category average".to_owned());
    }
    if factors.profit_margin < 15.0 {
        reasons.push("Thin profit margin limits the discount room".to_owned());
    }
    if reasons.is_empty() {
        reasons.push("No strong pricing pressure on this product".to_owned());
    }
    reasons
}

pub fn confidence(factors: &PricingFactors) -> f64 {
    let mut confidence: f64 = 0.5;
    // A moderate stock signal is more trustworthy than either extreme.
    if factors.stock_pressure > 0.1 && factors.stock_pressure < 0.9 {
        confidence += 0.2;
    }
    if factors.profit_margin > 15.0 {
        confidence += 0.2;
    }
    if factors.market_position.abs() < 0.3 {
        confidence += 0.1;
    }
    confidence.min(0.95)
}

pub struct PricingEngine<S> {
    store: Arc<S>,
    fanout_width: usize,
}

impl<S: CatalogStore + SalesStore> PricingEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store, fanout_width: PRICING_FANOUT_WIDTH }
    }

    pub fn with_fanout_width(mut self, width: usize) -> Self {
        self.fanout_width = width;
        self
    }

    /// Discount recommendation for one product; `None` when the product
    /// does not exist.
    pub async fn optimal_discount(
        &self,
        product_id: &ProductId,
    ) -> EngineResult<Option<DynamicPriceRecommendation>> {
        let Some(product) = self.store.product(product_id).await? else {
            return Ok(None);
        };
        let factors = self.derive_factors(&product).await?;
        Ok(Some(recommend(&product, &factors)))
    }

    /// Batch recommendations across up to [`BATCH_PRODUCT_LIMIT`]
    /// available products, keeping only moves of at least
    /// `min_impact_pct` from the current discount, biggest move first.
    pub async fn discount_recommendations(
        &self,
        min_impact_pct: u32,
        category: Option<&str>,
    ) -> EngineResult<Vec<DynamicPriceRecommendation>> {
        let mut query = ProductQuery::available().with_limit(BATCH_PRODUCT_LIMIT);
        if let Some(category) = category {
            query = query.with_category(category);
        }
        let products = self.store.products(&query).await?;

        let mut recommendations: Vec<DynamicPriceRecommendation> =
            try_map_bounded(products, self.fanout_width, |product: ProductSnapshot| async move {
                let factors = self.derive_factors(&product).await?;
                Ok::<_, crate::errors::EngineError>(recommend(&product, &factors))
            })
            .await?
            .into_iter()
            .filter(|r| r.impact_delta() >= min_impact_pct)
            .collect();

        recommendations.sort_by(|a, b| b.impact_delta().cmp(&a.impact_delta()));
        Ok(recommendations)
    }

    /// The engine's only write: persist a recommended discount onto the
    /// product record. Deliberately decoupled from computation so that
    /// "compute" never races with "mutate".
    pub async fn apply_recommendation(
        &self,
        product_id: &ProductId,
        discount_pct: u32,
    ) -> EngineResult<()> {
        self.store
            .set_product_discount(product_id, discount_pct.min(MAX_DISCOUNT_PCT))
            .await?;
        Ok(())
    }

    async fn derive_factors(&self, product: &ProductSnapshot) -> EngineResult<PricingFactors> {
        let now = Utc::now();
        let lines = self
            .store
            .realized_order_lines(&product.id, window_start(now, RECENT_MEAN_DAYS))
            .await?;
        let sold: u32 = aggregate_daily(&lines).iter().map(|p| p.quantity).sum();
        let average_daily_sales = f64::from(sold) / f64::from(RECENT_MEAN_DAYS);

        let category_average =
            self.store.category_average_price(&product.category).await?;

        Ok(PricingFactors {
            stock_pressure: stock_pressure(product.stock, average_daily_sales),
            age_multiplier: age_multiplier(product.age_days(now)),
            demand_elasticity: category_elasticity(&product.category),
            market_position: market_position(product.price, category_average),
            profit_margin: profit_margin_pct(product.price, product.cost_price),
        })
    }
}

fn recommend(product: &ProductSnapshot, factors: &PricingFactors) -> DynamicPriceRecommendation {
    let discount_pct = discount_score(factors);
    let recommended_price =
        product.price * Decimal::from(100 - discount_pct) / Decimal::from(100);

    DynamicPriceRecommendation {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        current_price: product.price,
        current_discount_pct: product.discount_pct,
        recommended_price,
        recommended_discount_pct: discount_pct,
        expected_impact: ExpectedImpact::from_discount(discount_pct),
        reasoning: build_reasoning(factors),
        confidence: confidence(factors),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::OrderId;
    use crate::store::mock::MockStore;

    fn product(id: &str, price: i64, cost: Option<i64>, stock: u32, age_days: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId(id.to_owned()),
            name: format!("Product {id}"),
            category: "beverages".to_owned(),
            supplier: "sup-alborz".to_owned(),
            price: Decimal::from(price),
            cost_price: cost.map(Decimal::from),
            discount_pct: 0,
            stock,
            available: true,
            featured: false,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    fn factors() -> PricingFactors {
        PricingFactors {
            stock_pressure: 0.0,
            age_multiplier: 0.0,
            demand_elasticity: 0.0,
            market_position: 0.0,
            profit_margin: 30.0,
        }
    }

    #[test]
    fn thin_margin_caps_at_five() {
        let f = PricingFactors {
            stock_pressure: 1.0,
            age_multiplier: 1.0,
            demand_elasticity: 0.8,
            market_position: 0.9,
            profit_margin: 8.0,
        };
        assert!(discount_score(&f) <= 5);
    }

    #[test]
    fn modest_margin_caps_at_fifteen() {
        let f = PricingFactors {
            stock_pressure: 1.0,
            age_multiplier: 1.0,
            demand_elasticity: 0.8,
            market_position: 0.9,
            profit_margin: 18.0,
        };
        let score = discount_score(&f);
        assert!(score > 5 && score <= 15);
    }

    #[test]
    fn healthy_margin_uses_full_weights() {
        let f = PricingFactors {
            stock_pressure: 1.0,
            age_multiplier: 1.0,
            demand_elasticity: 1.0,
            market_position: 1.0,
            profit_margin: 40.0,
        };
        // 40 + 20 + 15 + 15 = 90, clamped to the hard ceiling.
        assert_eq!(discount_score(&f), MAX_DISCOUNT_PCT);
    }

    #[test]
    fn below_average_price_contributes_nothing() {
        let mut f = factors();
        f.market_position = -0.8;
        f.stock_pressure = 0.5;
        let baseline = discount_score(&PricingFactors { market_position: 0.0, ..f });
        assert_eq!(discount_score(&f), baseline);
    }

    #[test]
    fn stock_pressure_brackets() {
        // 100 units at 1/day: 100 days of stock.
        assert_eq!(stock_pressure(100, 1.0), 1.0);
        assert_eq!(stock_pressure(45, 1.0), 0.7);
        assert_eq!(stock_pressure(20, 1.0), 0.4);
        assert_eq!(stock_pressure(5, 1.0), 0.1);
        // Dead stock special case.
        assert_eq!(stock_pressure(100, 0.0), 0.8);
        assert_eq!(stock_pressure(30, 0.0), 0.1);
    }

    #[test]
    fn age_brackets() {
        assert_eq!(age_multiplier(120), 1.0);
        assert_eq!(age_multiplier(75), 0.7);
        assert_eq!(age_multiplier(45), 0.4);
        assert_eq!(age_multiplier(10), 0.1);
    }

    #[test]
    fn unknown_category_gets_moderate_elasticity() {
        assert_eq!(category_elasticity("beverages"), 0.8);
        assert_eq!(category_elasticity("oils"), 0.35);
        assert_eq!(category_elasticity("mystery"), DEFAULT_ELASTICITY);
    }

    #[test]
    fn missing_cost_price_assumes_default_margin() {
        assert_eq!(profit_margin_pct(Decimal::from(100), None), DEFAULT_MARGIN_PCT);
        assert_eq!(
            profit_margin_pct(Decimal::from(100), Some(Decimal::ZERO)),
            DEFAULT_MARGIN_PCT
        );
        assert_eq!(profit_margin_pct(Decimal::from(100), Some(Decimal::from(75))), 25.0);
    }

    #[test]
    fn confidence_is_capped() {
        let f = PricingFactors {
            stock_pressure: 0.4,
            age_multiplier: 1.0,
            demand_elasticity: 0.8,
            market_position: 0.1,
            profit_margin: 40.0,
        };
        assert_eq!(confidence(&f), 0.95);
    }

    #[test]
    fn reasoning_mentions_margin_when_thin() {
        let mut f = factors();
        f.profit_margin = 9.0;
        let reasons = build_reasoning(&f);
        assert!(reasons.iter().any(|r| r.contains("margin")));
    }

    #[tokio::test]
    async fn missing_product_yields_none_not_error() {
        let store = Arc::new(MockStore::default());
        let engine = PricingEngine::new(store);
        let result = engine.optimal_discount(&ProductId("prod-ghost".to_owned())).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn dead_stock_old_product_scenario() {
        // 100 units, zero sales in 30 days, 120 days old, no category
        // average: pressure 0.8 and age 1.0 drive the recommendation.
        let snapshot = product("prod-tea-500g", 200, Some(100), 100, 120);
        let store = Arc::new(MockStore::with_products(vec![snapshot]));
        let engine = PricingEngine::new(store);

        let rec = engine
            .optimal_discount(&ProductId("prod-tea-500g".to_owned()))
            .await
            .unwrap()
            .unwrap();
        // 0.8*40 + 1.0*20 + 0.8*15 = 64, clamped to 50; margin 50% so no cap.
        assert_eq!(rec.recommended_discount_pct, MAX_DISCOUNT_PCT);
        assert_eq!(rec.expected_impact, ExpectedImpact::Significant);
        assert_eq!(rec.recommended_price, Decimal::from(100));
    }

    #[tokio::test]
    async fn batch_filters_by_impact_and_sorts_by_delta() {
        // Margin 5% caps the quiet product's score at 5.
        let quiet = product("prod-a-oil", 100, Some(95), 5, 10);
        let mover = product("prod-b-cola", 100, Some(50), 500, 120);
        let store = Arc::new(MockStore::with_products(vec![quiet, mover]));
        let engine = PricingEngine::new(store);

        let recs = engine.discount_recommendations(10, None).await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].product_id.0, "prod-b-cola");
        for pair in recs.windows(2) {
            assert!(pair[0].impact_delta() >= pair[1].impact_delta());
        }
    }

    #[tokio::test]
    async fn apply_writes_through_the_store_once() {
        let snapshot = product("prod-dates-1kg", 90, Some(60), 40, 50);
        let store = Arc::new(MockStore::with_products(vec![snapshot]));
        let engine = PricingEngine::new(Arc::clone(&store));

        engine
            .apply_recommendation(&ProductId("prod-dates-1kg".to_owned()), 12)
            .await
            .unwrap();
        let writes = store.applied_discounts.read().await;
        assert_eq!(writes.as_slice(), &[(ProductId("prod-dates-1kg".to_owned()), 12)]);
    }
}
