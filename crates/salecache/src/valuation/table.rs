use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use interface::{InventoryItem, SaleRecord};

use super::{estimate, ValuationEstimate};

/// 아이템 한 행. `estimates[i]`는 `decay_rates[i]`에 대응한다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationRow {
    pub item_id: String,
    pub estimates: Vec<Option<i64>>,
    pub purchase_price_minor: Option<i64>,
    /// 첫 번째 감쇠율 추정치 - 매입가
    pub gain_minor: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValuationTable {
    pub decay_rates: Vec<f64>,
    pub rows: Vec<ValuationRow>,
}

/// 감쇠율마다 추정을 돌려 아이템 기준으로 합친다 (outer join).
/// 어떤 감쇠율에서 추정이 없으면 그 칸은 None이다.
pub fn sweep(records: &[SaleRecord], decay_rates: &[f64]) -> ValuationTable {
    let mut rows: BTreeMap<String, Vec<Option<i64>>> = BTreeMap::new();

    for (column, rate) in decay_rates.iter().enumerate() {
        for (item_id, value) in estimate(records, *rate) {
            let cells = rows
                .entry(item_id)
                .or_insert_with(|| vec![None; decay_rates.len()]);
            cells[column] = Some(value);
        }
    }

    ValuationTable {
        decay_rates: decay_rates.to_vec(),
        rows: rows
            .into_iter()
            .map(|(item_id, estimates)| ValuationRow {
                item_id,
                estimates,
                purchase_price_minor: None,
                gain_minor: None,
            })
            .collect(),
    }
}

impl ValuationTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, item_id: &str) -> Option<&ValuationRow> {
        self.rows.iter().find(|row| row.item_id == item_id)
    }

    /// 인벤토리의 매입가를 붙이고 첫 감쇠율 추정치와의 차이를 계산한다
    pub fn with_purchase_prices(mut self, inventory: &[InventoryItem]) -> Self {
        let mut prices: BTreeMap<&str, i64> = BTreeMap::new();
        for item in inventory {
            if let Some(price) = item.purchase_price_minor {
                prices.entry(item.item_id.as_str()).or_insert(price);
            }
        }

        for row in &mut self.rows {
            row.purchase_price_minor = prices.get(row.item_id.as_str()).copied();
            row.gain_minor = match (row.estimates.first().copied().flatten(), row.purchase_price_minor) {
                (Some(value), Some(paid)) => Some(value - paid),
                _ => None,
            };
        }
        self
    }

    /// `index`번째 감쇠율 열을 추정치 목록으로 꺼낸다
    pub fn estimates_for(&self, index: usize) -> Vec<ValuationEstimate> {
        let Some(rate) = self.decay_rates.get(index).copied() else {
            return Vec::new();
        };

        self.rows
            .iter()
            .filter_map(|row| {
                row.estimates.get(index).copied().flatten().map(|value| ValuationEstimate {
                    item_id: row.item_id.clone(),
                    estimated_value: value,
                    decay_rate: rate,
                })
            })
            .collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        if self.decay_rates.len() == 1 {
            return vec!["estimated_value".to_string()];
        }
        self.decay_rates
            .iter()
            .map(|rate| format!("estimated_value_{}", rate))
            .collect()
    }

    /// 고정폭 텍스트 표. 값이 없는 칸은 `-`.
    pub fn render(&self) -> String {
        let with_purchase = self.rows.iter().any(|r| r.purchase_price_minor.is_some());

        let mut header = vec!["item_id".to_string()];
        header.extend(self.column_names());
        if with_purchase {
            header.push("purchase_price".to_string());
            header.push("gain".to_string());
        }

        let cell = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                let mut line = vec![row.item_id.clone()];
                line.extend(row.estimates.iter().map(|v| cell(*v)));
                if with_purchase {
                    line.push(cell(row.purchase_price_minor));
                    line.push(cell(row.gain_minor));
                }
                line
            })
            .collect();

        let widths: Vec<usize> = (0..header.len())
            .map(|i| {
                body.iter()
                    .map(|line| line[i].len())
                    .chain(std::iter::once(header[i].len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        for line in std::iter::once(&header).chain(body.iter()) {
            let cells: Vec<String> = line
                .iter()
                .zip(&widths)
                .enumerate()
                .map(|(i, (text, width))| {
                    if i == 0 {
                        format!("{:<width$}", text, width = width)
                    } else {
                        format!("{:>width$}", text, width = width)
                    }
                })
                .collect();
            let _ = writeln!(out, "{}", cells.join("  ").trim_end());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use interface::{Rarity, SeasonEligibility};

    fn sale(item_id: &str, offset_days: i64, price: i64) -> SaleRecord {
        SaleRecord {
            id: format!("{}:{}:{}", item_id, offset_days, price),
            item_id: item_id.to_string(),
            category: Rarity::Rare,
            variant_id: "card".to_string(),
            season_eligibility: SeasonEligibility::Classic,
            price_minor: price,
            buyer_id: Some("buyer".to_string()),
            seller_id: "seller".to_string(),
            date: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::days(offset_days),
        }
    }

    fn holding(item_id: &str, paid: Option<i64>) -> InventoryItem {
        InventoryItem {
            item_id: item_id.to_string(),
            category: Rarity::Rare,
            season_eligibility: SeasonEligibility::Classic,
            purchase_price_minor: paid,
        }
    }

    #[test]
    fn sweep_builds_one_column_per_rate() {
        let records = vec![
            sale("a", -20, 100),
            sale("a", -19, 100),
            sale("a", -1, 10),
            sale("a", 0, 10),
            sale("a", 0, 10),
            sale("b", 0, 7),
        ];
        let table = sweep(&records, &[0.0, 1.0]);

        assert_eq!(table.decay_rates, vec![0.0, 1.0]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.row("a").unwrap().estimates, vec![Some(10), Some(10)]);
        assert_eq!(table.row("b").unwrap().estimates, vec![Some(7), Some(7)]);
        assert_eq!(
            table.column_names(),
            vec!["estimated_value_0".to_string(), "estimated_value_1".to_string()]
        );
    }

    #[test]
    fn sweep_without_rates_or_records_is_empty() {
        assert!(sweep(&[], &[0.05]).is_empty());
        assert!(sweep(&[sale("a", 0, 1)], &[]).is_empty());
    }

    #[test]
    fn purchase_prices_produce_signed_gain() {
        let records = vec![sale("a", 0, 120), sale("b", 0, 40), sale("c", 0, 5)];
        let table = sweep(&records, &[0.05])
            .with_purchase_prices(&[holding("a", Some(100)), holding("b", Some(50)), holding("c", None)]);

        assert_eq!(table.row("a").unwrap().gain_minor, Some(20));
        assert_eq!(table.row("b").unwrap().gain_minor, Some(-10));
        assert_eq!(table.row("c").unwrap().purchase_price_minor, None);
        assert_eq!(table.row("c").unwrap().gain_minor, None);
    }

    #[test]
    fn estimates_for_reads_a_single_column() {
        let table = sweep(&[sale("a", 0, 3), sale("b", 0, 4)], &[0.1]);
        let column = table.estimates_for(0);
        assert_eq!(column.len(), 2);
        assert_eq!(column[0].item_id, "a");
        assert_eq!(column[0].decay_rate, 0.1);
        assert!(table.estimates_for(3).is_empty());
    }

    #[test]
    fn render_aligns_columns() {
        let table = sweep(&[sale("a", 0, 3), sale("bb", 0, 1234)], &[0.05])
            .with_purchase_prices(&[holding("a", Some(1))]);
        let text = table.render();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("item_id"));
        assert!(lines[0].contains("estimated_value"));
        assert!(lines[0].ends_with("gain"));
        assert!(lines[1].starts_with("a "));
        assert!(lines[1].ends_with('2'));
        assert!(lines[2].ends_with('-'));
    }
}
