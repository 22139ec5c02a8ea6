//! 시간 감쇠 가중 중앙값 기반 가치 추정.
//!
//! 모든 함수는 순수 함수다. 입력 기록은 저장소 윈도우에서 읽은 것을 그대로 쓴다.

pub mod table;

use std::collections::BTreeMap;

use serde::Serialize;

use interface::SaleRecord;

pub use table::{sweep, ValuationRow, ValuationTable};

/// 아이템 하나의 추정 가치
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationEstimate {
    pub item_id: String,
    pub estimated_value: i64,
    pub decay_rate: f64,
}

/// 누적 가중치가 처음으로 전체의 절반 이상이 되는 값 (하위 중앙값 규칙, 보간 없음).
/// 입력이 비었거나 길이가 다르면 None.
pub fn weighted_median(values: &[i64], weights: &[f64]) -> Option<i64> {
    if values.is_empty() || values.len() != weights.len() {
        return None;
    }

    let mut pairs: Vec<(i64, f64)> = values.iter().copied().zip(weights.iter().copied()).collect();
    pairs.sort_by_key(|(value, _)| *value);

    let half = pairs.iter().map(|(_, w)| w).sum::<f64>() / 2.0;
    let mut cumulative = 0.0;
    for (value, weight) in &pairs {
        cumulative += weight;
        if cumulative >= half {
            return Some(*value);
        }
    }

    pairs.last().map(|(value, _)| *value)
}

/// 아이템별 가치 추정. 가장 최근 거래 기준 경과 일수 d에 대해 가중치 exp(-decay_rate * d).
pub fn estimate(records: &[SaleRecord], decay_rate: f64) -> BTreeMap<String, i64> {
    let mut groups: BTreeMap<&str, Vec<&SaleRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.item_id.as_str()).or_default().push(record);
    }

    let mut estimates = BTreeMap::new();
    for (item_id, group) in groups {
        let Some(latest) = group.iter().map(|r| r.date).max() else {
            continue;
        };

        let prices: Vec<i64> = group.iter().map(|r| r.price_minor).collect();
        let weights: Vec<f64> = group
            .iter()
            .map(|r| {
                let days_ago = (latest - r.date).num_days().max(0) as f64;
                (-decay_rate * days_ago).exp()
            })
            .collect();

        if let Some(value) = weighted_median(&prices, &weights) {
            estimates.insert(item_id.to_string(), value);
        }
    }

    estimates
}

/// `estimate` 결과를 `ValuationEstimate` 목록으로 돌려준다
pub fn estimates(records: &[SaleRecord], decay_rate: f64) -> Vec<ValuationEstimate> {
    estimate(records, decay_rate)
        .into_iter()
        .map(|(item_id, estimated_value)| ValuationEstimate {
            item_id,
            estimated_value,
            decay_rate,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use interface::{Rarity, SeasonEligibility};

    fn at(offset_days: i64, hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 10, 12, 0, 0).unwrap()
            + Duration::days(offset_days)
            + Duration::hours(hours)
    }

    fn sale(item_id: &str, offset_days: i64, price: i64) -> SaleRecord {
        SaleRecord {
            id: format!("{}-{}-{}", item_id, offset_days, price),
            item_id: item_id.to_string(),
            category: Rarity::Limited,
            variant_id: "card".to_string(),
            season_eligibility: SeasonEligibility::InSeason,
            price_minor: price,
            buyer_id: None,
            seller_id: "seller".to_string(),
            date: at(offset_days, 0),
        }
    }

    #[test]
    fn weighted_median_uses_lower_median_tie_break() {
        assert_eq!(weighted_median(&[10, 20], &[1.0, 3.0]), Some(20));
        assert_eq!(weighted_median(&[10, 20], &[1.0, 1.0]), Some(10));
        assert_eq!(weighted_median(&[5, 5, 5], &[1.0, 1.0, 1.0]), Some(5));
    }

    #[test]
    fn weighted_median_sorts_by_value() {
        assert_eq!(weighted_median(&[30, 10, 20], &[1.0, 1.0, 5.0]), Some(20));
        assert_eq!(weighted_median(&[30, 10, 20], &[10.0, 1.0, 1.0]), Some(30));
    }

    #[test]
    fn weighted_median_rejects_bad_input() {
        assert_eq!(weighted_median(&[], &[]), None);
        assert_eq!(weighted_median(&[1, 2], &[1.0]), None);
    }

    #[test]
    fn zero_decay_is_plain_lower_median() {
        let records = vec![
            sale("p", -9, 40),
            sale("p", -3, 10),
            sale("p", -1, 30),
            sale("p", 0, 20),
        ];
        assert_eq!(estimate(&records, 0.0).get("p"), Some(&20));
    }

    #[test]
    fn decay_favours_recent_sales() {
        let records = vec![
            sale("p", -30, 100),
            sale("p", -29, 100),
            sale("p", -28, 100),
            sale("p", -1, 10),
            sale("p", 0, 10),
        ];
        assert_eq!(estimate(&records, 0.0).get("p"), Some(&100));
        assert_eq!(estimate(&records, 0.5).get("p"), Some(&10));
    }

    #[test]
    fn days_ago_counts_whole_days() {
        let mut recent = sale("p", 0, 10);
        recent.date = at(0, 0);
        let mut same_day = sale("p", 0, 50);
        same_day.date = at(0, -20);

        // 20시간 전 거래는 0일로 취급되어 감쇠되지 않는다
        let records = vec![recent, same_day];
        let value = estimate(&records, 10.0);
        assert_eq!(value.get("p"), Some(&10));
        assert_eq!(weighted_median(&[10, 50], &[1.0, 1.0]), Some(10));
    }

    #[test]
    fn estimate_groups_by_item() {
        let records = vec![sale("a", 0, 10), sale("b", 0, 99), sale("a", -1, 12)];
        let values = estimates(&records, 0.1);
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].item_id, "a");
        assert_eq!(values[1].estimated_value, 99);
        assert!(estimate(&[], 0.1).is_empty());
    }
}
