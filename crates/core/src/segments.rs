//! RFM customer segmentation.
//!
//! Quintile cut points are recomputed from the current customer
//! population on every run (nearest-rank on the sorted values), so a
//! segment label is meaningful only relative to the snapshot it was
//! computed against. This relative scoring is deliberate; do not replace
//! the cut points with fixed absolute thresholds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{CustomerOrderStats, UserId};
use crate::errors::EngineResult;
use crate::store::CustomerStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentLabel {
    Champions,
    Loyal,
    Promising,
    AtRisk,
    Lost,
}

impl SegmentLabel {
    pub fn from_total_score(total: u8) -> Self {
        if total >= 13 {
            Self::Champions
        } else if total >= 10 {
            Self::Loyal
        } else if total >= 7 {
            Self::Promising
        } else if total >= 5 {
            Self::AtRisk
        } else {
            Self::Lost
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Champions => "Champions",
            Self::Loyal => "Loyal",
            Self::Promising => "Promising",
            Self::AtRisk => "At Risk",
            Self::Lost => "Lost",
        }
    }
}

/// One customer's RFM scores against the current population.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RfmSegment {
    pub user_id: UserId,
    pub user_name: String,
    pub shop_name: String,
    pub recency_score: u8,
    pub frequency_score: u8,
    pub monetary_score: u8,
    /// Sum of the three 1-5 scores, range 3-15.
    pub total_score: u8,
    pub segment: SegmentLabel,
    pub last_order_at: DateTime<Utc>,
    pub total_orders: u32,
    pub total_spent: Decimal,
}

/// Nearest-rank quintile cut points (20th/40th/60th/80th percentile)
/// over an unsorted population sample.
pub fn quintile_thresholds(values: &[f64]) -> [f64; 4] {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pick = |percentile: f64| -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let rank = ((percentile * sorted.len() as f64).ceil() as usize).max(1);
        sorted[rank.min(sorted.len()) - 1]
    };
    [pick(0.2), pick(0.4), pick(0.6), pick(0.8)]
}

/// Score 1-5: one point plus one per threshold strictly exceeded.
pub fn quintile_score(value: f64, thresholds: &[f64; 4]) -> u8 {
    1 + thresholds.iter().filter(|t| value > **t).count() as u8
}

pub struct CustomerSegmenter<S> {
    store: Arc<S>,
}

impl<S: CustomerStore> CustomerSegmenter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Segment every customer with at least one delivered order. An
    /// empty qualifying population is a normal state and yields an
    /// empty vec.
    pub async fn calculate_rfm_segments(&self) -> EngineResult<Vec<RfmSegment>> {
        let stats = self.store.delivered_order_stats().await?;
        Ok(segment_population(&stats, Utc::now()))
    }
}

pub fn segment_population(stats: &[CustomerOrderStats], now: DateTime<Utc>) -> Vec<RfmSegment> {
    if stats.is_empty() {
        return Vec::new();
    }

    let recency: Vec<f64> =
        stats.iter().map(|s| (now - s.last_order_at).num_days() as f64).collect();
    let frequency: Vec<f64> = stats.iter().map(|s| f64::from(s.order_count)).collect();
    let monetary: Vec<f64> =
        stats.iter().map(|s| s.total_spent.to_f64().unwrap_or(0.0)).collect();

    let recency_cuts = quintile_thresholds(&recency);
    let frequency_cuts = quintile_thresholds(&frequency);
    let monetary_cuts = quintile_thresholds(&monetary);

    let mut segments: Vec<RfmSegment> = stats
        .iter()
        .enumerate()
        .map(|(i, customer)| {
            // Lower recency means a more recent order, so the raw
            // quintile score is inverted.
            let recency_score = 6 - quintile_score(recency[i], &recency_cuts);
            let frequency_score = quintile_score(frequency[i], &frequency_cuts);
            let monetary_score = quintile_score(monetary[i], &monetary_cuts);
            let total_score = recency_score + frequency_score + monetary_score;

            RfmSegment {
                user_id: customer.user_id.clone(),
                user_name: customer.name.clone(),
                shop_name: customer.shop_name.clone(),
                recency_score,
                frequency_score,
                monetary_score,
                total_score,
                segment: SegmentLabel::from_total_score(total_score),
                last_order_at: customer.last_order_at,
                total_orders: customer.order_count,
                total_spent: customer.total_spent,
            }
        })
        .collect();

    segments.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    segments
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn stats(
        id: &str,
        days_since_order: i64,
        order_count: u32,
        total_spent: i64,
        now: DateTime<Utc>,
    ) -> CustomerOrderStats {
        CustomerOrderStats {
            user_id: UserId(id.to_owned()),
            name: format!("Customer {id}"),
            shop_name: format!("Shop {id}"),
            last_order_at: now - Duration::days(days_since_order),
            order_count,
            total_spent: Decimal::from(total_spent),
        }
    }

    #[test]
    fn empty_population_yields_empty_output() {
        assert!(segment_population(&[], Utc::now()).is_empty());
    }

    #[test]
    fn nearest_rank_thresholds() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(quintile_thresholds(&values), [2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn thresholds_on_tiny_population() {
        assert_eq!(quintile_thresholds(&[42.0]), [42.0, 42.0, 42.0, 42.0]);
    }

    #[test]
    fn scores_stay_in_band_and_labels_are_defined() {
        let now = Utc::now();
        let population: Vec<CustomerOrderStats> = (0..25)
            .map(|i| stats(&format!("user-{i}"), i64::from(i) * 11 + 1, i + 1, i64::from(i) * 900, now))
            .collect();

        let segments = segment_population(&population, now);
        assert_eq!(segments.len(), 25);
        for segment in &segments {
            assert!((1..=5).contains(&segment.recency_score));
            assert!((1..=5).contains(&segment.frequency_score));
            assert!((1..=5).contains(&segment.monetary_score));
            assert!((3..=15).contains(&segment.total_score));
        }
        // Sorted descending by total score.
        for pair in segments.windows(2) {
            assert!(pair[0].total_score >= pair[1].total_score);
        }
    }

    #[test]
    fn best_customer_scores_champion_against_weak_peers() {
        let now = Utc::now();
        let mut population = vec![stats("whale", 1, 60, 1_000_000, now)];
        for i in 0..20 {
            population.push(stats(&format!("small-{i}"), 200 + i, 1, 50, now));
        }

        let segments = segment_population(&population, now);
        let whale = segments.iter().find(|s| s.user_id.0 == "whale").unwrap();
        assert_eq!(whale.recency_score, 5);
        assert_eq!(whale.frequency_score, 5);
        assert_eq!(whale.monetary_score, 5);
        assert_eq!(whale.segment, SegmentLabel::Champions);
        assert_eq!(segments[0].user_id.0, "whale");
    }

    #[test]
    fn segment_bands() {
        assert_eq!(SegmentLabel::from_total_score(15), SegmentLabel::Champions);
        assert_eq!(SegmentLabel::from_total_score(13), SegmentLabel::Champions);
        assert_eq!(SegmentLabel::from_total_score(12), SegmentLabel::Loyal);
        assert_eq!(SegmentLabel::from_total_score(10), SegmentLabel::Loyal);
        assert_eq!(SegmentLabel::from_total_score(9), SegmentLabel::Promising);
        assert_eq!(SegmentLabel::from_total_score(7), SegmentLabel::Promising);
        assert_eq!(SegmentLabel::from_total_score(6), SegmentLabel::AtRisk);
        assert_eq!(SegmentLabel::from_total_score(5), SegmentLabel::AtRisk);
        assert_eq!(SegmentLabel::from_total_score(4), SegmentLabel::Lost);
        assert_eq!(SegmentLabel::from_total_score(3), SegmentLabel::Lost);
    }
}
