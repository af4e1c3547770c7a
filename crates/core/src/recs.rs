//! Product recommendations: a weighted blend of collaborative
//! (users-with-similar-baskets) and content-based (category/supplier
//! preference) signals, with a popularity fallback for new customers and
//! an anonymous frequently-bought-together path for carts.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ProductId, ProductQuery, PurchasedLine, UserId};
use crate::errors::EngineResult;
use crate::store::{CatalogStore, OrderStore};

/// Orders of the current user inspected for preferences.
pub const RECENT_ORDER_LIMIT: usize = 20;
/// Candidate co-purchase orders considered for similarity.
pub const CANDIDATE_ORDER_LIMIT: usize = 50;
/// Most-similar users whose baskets feed the collaborative tally.
pub const TOP_SIMILAR_USERS: usize = 10;
/// Top categories and suppliers carried into the content query.
pub const TOP_PREFERENCES: usize = 3;
/// Candidate products fetched for the content signal.
pub const CONTENT_CANDIDATE_LIMIT: usize = 30;
/// Order lines scanned for the cart path.
pub const CART_LINE_LIMIT: usize = 100;

pub const COLLABORATIVE_WEIGHT: f64 = 0.6;
pub const CONTENT_WEIGHT: f64 = 0.4;
pub const CATEGORY_PREFERENCE_WEIGHT: f64 = 0.4;
pub const SUPPLIER_PREFERENCE_WEIGHT: f64 = 0.3;
pub const FEATURED_BOOST: f64 = 10.0;
pub const NEW_PRODUCT_BOOST: f64 = 5.0;
pub const NEW_PRODUCT_WINDOW_DAYS: i64 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    UsersAlsoBought,
    SimilarToPurchases,
    SimilarAndPopular,
    Popular,
    FrequentlyBoughtTogether,
}

impl RecommendationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsersAlsoBought => "users_also_bought",
            Self::SimilarToPurchases => "similar_to_purchases",
            Self::SimilarAndPopular => "similar_and_popular",
            Self::Popular => "popular",
            Self::FrequentlyBoughtTogether => "frequently_bought_together",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::UsersAlsoBought => "Shops with similar baskets also ordered this",
            Self::SimilarToPurchases => "Close to what you usually order",
            Self::SimilarAndPopular => "Matches your orders and sells well with similar shops",
            Self::Popular => "A top seller across the platform",
            Self::FrequentlyBoughtTogether => "Frequently ordered together with your cart",
        }
    }
}

/// A ranked recommendation; the score is relative, not comparable
/// across invocations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationScore {
    pub product_id: ProductId,
    pub score: f64,
    pub reason: RecommendationReason,
}

/// Jaccard similarity of two product-id sets.
pub fn jaccard_similarity(a: &HashSet<ProductId>, b: &HashSet<ProductId>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

pub struct RecommendationEngine<S> {
    store: Arc<S>,
}

impl<S: CatalogStore + OrderStore> RecommendationEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Ranked recommendations for a known customer. Falls back to the
    /// platform-wide popularity ranking when the user has no purchase
    /// history yet; "no data" is a normal state, never an error.
    pub async fn personalized(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> EngineResult<Vec<RecommendationScore>> {
        let purchases = self.store.recent_purchases(user_id, RECENT_ORDER_LIMIT).await?;
        if purchases.is_empty() {
            return self.popular(limit).await;
        }

        let owned: HashSet<ProductId> =
            purchases.iter().map(|line| line.product_id.clone()).collect();
        let (category_prefs, supplier_prefs) = preference_tallies(&purchases);

        let collaborative = self.collaborative_scores(user_id, &owned).await?;
        let content = self.content_scores(&owned, &category_prefs, &supplier_prefs).await?;

        Ok(merge_signals(collaborative, content, limit))
    }

    /// Anonymous frequently-bought-together scoring from a cart's
    /// contents. An empty cart short-circuits without touching the store.
    pub async fn cart_recommendations(
        &self,
        cart_ids: &[ProductId],
        limit: usize,
    ) -> EngineResult<Vec<RecommendationScore>> {
        if cart_ids.is_empty() {
            return Ok(Vec::new());
        }

        let lines = self.store.co_purchase_lines(cart_ids, CART_LINE_LIMIT).await?;
        let mut frequency: HashMap<ProductId, u32> = HashMap::new();
        for product_id in lines {
            *frequency.entry(product_id).or_insert(0) += 1;
        }

        let mut scored: Vec<RecommendationScore> = frequency
            .into_iter()
            .map(|(product_id, count)| RecommendationScore {
                product_id,
                score: f64::from(count),
                reason: RecommendationReason::FrequentlyBoughtTogether,
            })
            .collect();
        sort_ranked(&mut scored);
        scored.truncate(limit);
        Ok(scored)
    }

    async fn popular(&self, limit: usize) -> EngineResult<Vec<RecommendationScore>> {
        let popular = self.store.popular_products(limit).await?;
        Ok(popular
            .into_iter()
            .enumerate()
            .map(|(rank, (product_id, _count))| RecommendationScore {
                product_id,
                score: 1.0 / (rank as f64 + 1.0),
                reason: RecommendationReason::Popular,
            })
            .collect())
    }

    /// Collaborative signal: candidate orders sharing a product, Jaccard
    /// similarity per order, keep each user's best order, tally the
    /// top similar users' baskets minus what the user already owns.
    async fn collaborative_scores(
        &self,
        user_id: &UserId,
        owned: &HashSet<ProductId>,
    ) -> EngineResult<HashMap<ProductId, f64>> {
        let owned_list: Vec<ProductId> = owned.iter().cloned().collect();
        let candidates = self
            .store
            .orders_sharing_products(&owned_list, user_id, CANDIDATE_ORDER_LIMIT)
            .await?;

        let mut best_similarity: HashMap<UserId, f64> = HashMap::new();
        for order in &candidates {
            let basket: HashSet<ProductId> = order.product_ids.iter().cloned().collect();
            let similarity = jaccard_similarity(owned, &basket);
            let entry = best_similarity.entry(order.user_id.clone()).or_insert(0.0);
            if similarity > *entry {
                *entry = similarity;
            }
        }

        let mut ranked_users: Vec<(UserId, f64)> = best_similarity.into_iter().collect();
        ranked_users.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0 .0.cmp(&b.0 .0))
        });
        ranked_users.truncate(TOP_SIMILAR_USERS);
        let top_users: HashSet<&UserId> = ranked_users.iter().map(|(user, _)| user).collect();

        let mut scores: HashMap<ProductId, f64> = HashMap::new();
        for order in candidates.iter().filter(|order| top_users.contains(&order.user_id)) {
            for product_id in &order.product_ids {
                if owned.contains(product_id) {
                    continue;
                }
                *scores.entry(product_id.clone()).or_insert(0.0) += 1.0;
            }
        }
        Ok(scores)
    }

    /// Content signal: available, not-yet-purchased products in the
    /// user's favorite categories/suppliers, scored by preference weight
    /// plus featured/new-arrival boosts.
    async fn content_scores(
        &self,
        owned: &HashSet<ProductId>,
        category_prefs: &[(String, u32)],
        supplier_prefs: &[(String, u32)],
    ) -> EngineResult<HashMap<ProductId, f64>> {
        let categories: Vec<String> = category_prefs
            .iter()
            .take(TOP_PREFERENCES)
            .map(|(name, _)| name.clone())
            .collect();
        let suppliers: Vec<String> = supplier_prefs
            .iter()
            .take(TOP_PREFERENCES)
            .map(|(name, _)| name.clone())
            .collect();

        let query = ProductQuery {
            only_available: true,
            categories,
            suppliers,
            exclude_ids: owned.iter().cloned().collect(),
            limit: Some(CONTENT_CANDIDATE_LIMIT),
            ..ProductQuery::default()
        };
        let candidates = self.store.products(&query).await?;

        let category_weight: HashMap<&str, u32> =
            category_prefs.iter().map(|(name, weight)| (name.as_str(), *weight)).collect();
        let supplier_weight: HashMap<&str, u32> =
            supplier_prefs.iter().map(|(name, weight)| (name.as_str(), *weight)).collect();
        let fresh_after = Utc::now() - Duration::days(NEW_PRODUCT_WINDOW_DAYS);

        let mut scores = HashMap::new();
        for product in candidates {
            let mut score = CATEGORY_PREFERENCE_WEIGHT
                * f64::from(category_weight.get(product.category.as_str()).copied().unwrap_or(0))
                + SUPPLIER_PREFERENCE_WEIGHT
                    * f64::from(
                        supplier_weight.get(product.supplier.as_str()).copied().unwrap_or(0),
                    );
            if product.featured {
                score += FEATURED_BOOST;
            }
            if product.created_at > fresh_after {
                score += NEW_PRODUCT_BOOST;
            }
            scores.insert(product.id, score);
        }
        Ok(scores)
    }
}

/// Quantity-weighted category and supplier tallies, heaviest first.
fn preference_tallies(purchases: &[PurchasedLine]) -> (Vec<(String, u32)>, Vec<(String, u32)>) {
    let mut categories: HashMap<String, u32> = HashMap::new();
    let mut suppliers: HashMap<String, u32> = HashMap::new();
    for line in purchases {
        *categories.entry(line.category.clone()).or_insert(0) += line.quantity;
        *suppliers.entry(line.supplier.clone()).or_insert(0) += line.quantity;
    }
    let mut categories: Vec<(String, u32)> = categories.into_iter().collect();
    let mut suppliers: Vec<(String, u32)> = suppliers.into_iter().collect();
    categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    suppliers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    (categories, suppliers)
}

fn merge_signals(
    collaborative: HashMap<ProductId, f64>,
    content: HashMap<ProductId, f64>,
    limit: usize,
) -> Vec<RecommendationScore> {
    let mut merged: HashMap<ProductId, (f64, bool, bool)> = HashMap::new();
    for (product_id, score) in collaborative {
        let entry = merged.entry(product_id).or_insert((0.0, false, false));
        entry.0 += score * COLLABORATIVE_WEIGHT;
        entry.1 = true;
    }
    for (product_id, score) in content {
        let entry = merged.entry(product_id).or_insert((0.0, false, false));
        entry.0 += score * CONTENT_WEIGHT;
        entry.2 = true;
    }

    let mut ranked: Vec<RecommendationScore> = merged
        .into_iter()
        .map(|(product_id, (score, from_collab, from_content))| RecommendationScore {
            product_id,
            score,
            reason: match (from_collab, from_content) {
                (true, true) => RecommendationReason::SimilarAndPopular,
                (true, false) => RecommendationReason::UsersAlsoBought,
                _ => RecommendationReason::SimilarToPurchases,
            },
        })
        .collect();
    sort_ranked(&mut ranked);
    ranked.truncate(limit);
    ranked
}

fn sort_ranked(scored: &mut [RecommendationScore]) {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.product_id.0.cmp(&b.product_id.0))
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::Duration;
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::{CoPurchaseOrder, OrderId, ProductSnapshot};
    use crate::store::mock::MockStore;

    fn pid(id: &str) -> ProductId {
        ProductId(id.to_owned())
    }

    fn snapshot(id: &str, category: &str, supplier: &str) -> ProductSnapshot {
        ProductSnapshot {
            id: pid(id),
            name: format!("Product {id}"),
            category: category.to_owned(),
            supplier: supplier.to_owned(),
            price: Decimal::from(100),
            cost_price: Some(Decimal::from(70)),
            discount_pct: 0,
            stock: 50,
            available: true,
            featured: false,
            created_at: Utc::now() - Duration::days(60),
        }
    }

    fn purchased(id: &str, quantity: u32, category: &str, supplier: &str) -> PurchasedLine {
        PurchasedLine {
            order_id: OrderId("order-1".to_owned()),
            product_id: pid(id),
            quantity,
            category: category.to_owned(),
            supplier: supplier.to_owned(),
        }
    }

    fn co_order(order: &str, user: &str, products: &[&str]) -> CoPurchaseOrder {
        CoPurchaseOrder {
            order_id: OrderId(order.to_owned()),
            user_id: UserId(user.to_owned()),
            product_ids: products.iter().map(|p| pid(p)).collect(),
        }
    }

    #[test]
    fn jaccard_basics() {
        let a: HashSet<ProductId> = [pid("a"), pid("b")].into_iter().collect();
        let b: HashSet<ProductId> = [pid("b"), pid("c")].into_iter().collect();
        assert!((jaccard_similarity(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(jaccard_similarity(&a, &a), 1.0);
        assert_eq!(jaccard_similarity(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn preference_tallies_weight_by_quantity() {
        let purchases = vec![
            purchased("a", 2, "grains", "sup-1"),
            purchased("b", 10, "beverages", "sup-2"),
            purchased("c", 1, "grains", "sup-1"),
        ];
        let (categories, suppliers) = preference_tallies(&purchases);
        assert_eq!(categories[0], ("beverages".to_owned(), 10));
        assert_eq!(categories[1], ("grains".to_owned(), 3));
        assert_eq!(suppliers[0], ("sup-2".to_owned(), 10));
    }

    #[test]
    fn merge_labels_by_signal_origin() {
        let collaborative: HashMap<ProductId, f64> =
            [(pid("both"), 2.0), (pid("collab-only"), 3.0)].into_iter().collect();
        let content: HashMap<ProductId, f64> =
            [(pid("both"), 4.0), (pid("content-only"), 1.0)].into_iter().collect();

        let ranked = merge_signals(collaborative, content, 10);
        let by_id: HashMap<&str, &RecommendationScore> =
            ranked.iter().map(|r| (r.product_id.0.as_str(), r)).collect();

        assert_eq!(by_id["both"].reason, RecommendationReason::SimilarAndPopular);
        assert!((by_id["both"].score - (2.0 * 0.6 + 4.0 * 0.4)).abs() < 1e-9);
        assert_eq!(by_id["collab-only"].reason, RecommendationReason::UsersAlsoBought);
        assert_eq!(by_id["content-only"].reason, RecommendationReason::SimilarToPurchases);
    }

    #[tokio::test]
    async fn empty_cart_short_circuits_without_store_reads() {
        let store = Arc::new(MockStore::default());
        let engine = RecommendationEngine::new(Arc::clone(&store));
        let recs = engine.cart_recommendations(&[], 5).await.unwrap();
        assert!(recs.is_empty());
        assert_eq!(store.co_purchase_calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn cart_path_ranks_by_co_occurrence() {
        let mut store = MockStore::with_products(vec![
            snapshot("bread", "grains", "sup-1"),
            snapshot("cheese", "dairy", "sup-2"),
            snapshot("tea", "beverages", "sup-3"),
        ]);
        store.co_orders = vec![
            co_order("o1", "u1", &["bread", "cheese"]),
            co_order("o2", "u2", &["bread", "cheese", "tea"]),
            co_order("o3", "u3", &["bread", "tea"]),
            co_order("o4", "u4", &["cheese", "tea"]),
        ];
        let engine = RecommendationEngine::new(Arc::new(store));

        let recs = engine.cart_recommendations(&[pid("bread")], 5).await.unwrap();
        assert_eq!(recs[0].product_id, pid("cheese"));
        assert_eq!(recs[0].score, 2.0);
        assert_eq!(recs[0].reason, RecommendationReason::FrequentlyBoughtTogether);
        assert_eq!(recs[1].product_id, pid("tea"));
    }

    #[tokio::test]
    async fn no_history_falls_back_to_popular() {
        let mut store = MockStore::default();
        store.popular = vec![(pid("rice"), 40), (pid("oil"), 25), (pid("sugar"), 10)];
        let engine = RecommendationEngine::new(Arc::new(store));

        let recs = engine.personalized(&UserId("new-shop".to_owned()), 2).await.unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].product_id, pid("rice"));
        assert_eq!(recs[0].reason, RecommendationReason::Popular);
        assert!(recs[0].score > recs[1].score);
    }

    #[tokio::test]
    async fn personalized_excludes_owned_products() {
        let mut store = MockStore::with_products(vec![
            snapshot("rice", "grains", "sup-1"),
            snapshot("lentils", "legumes", "sup-1"),
            snapshot("cola", "beverages", "sup-2"),
        ]);
        store.purchases.insert(
            "shop-7".to_owned(),
            vec![purchased("rice", 5, "grains", "sup-1")],
        );
        store.co_orders = vec![
            co_order("o1", "peer-1", &["rice", "lentils"]),
            co_order("o2", "peer-2", &["rice", "lentils", "cola"]),
        ];
        let engine = RecommendationEngine::new(Arc::new(store));

        let recs = engine.personalized(&UserId("shop-7".to_owned()), 10).await.unwrap();
        assert!(recs.iter().all(|r| r.product_id != pid("rice")));
        assert!(recs.iter().any(|r| r.product_id == pid("lentils")));
    }

    #[tokio::test]
    async fn overlap_of_signals_is_labelled_similar_and_popular() {
        let mut store = MockStore::with_products(vec![
            snapshot("rice", "grains", "sup-1"),
            snapshot("lentils", "grains", "sup-1"),
        ]);
        store.purchases.insert(
            "shop-9".to_owned(),
            vec![purchased("rice", 3, "grains", "sup-1")],
        );
        // Peers bought lentils too, and lentils also match the user's
        // preferred category/supplier.
        store.co_orders = vec![co_order("o1", "peer-1", &["rice", "lentils"])];
        let engine = RecommendationEngine::new(Arc::new(store));

        let recs = engine.personalized(&UserId("shop-9".to_owned()), 10).await.unwrap();
        let lentils = recs.iter().find(|r| r.product_id == pid("lentils")).unwrap();
        assert_eq!(lentils.reason, RecommendationReason::SimilarAndPopular);
    }
}
