use serde::Serialize;
use tracing::{info, warn};

use super::pager::StopReason;

/// 아이템 한 건의 최종 처리 결과
#[derive(Debug, Clone)]
pub enum ItemResult {
    Refreshed {
        item_id: String,
        inserted: u64,
        dropped: usize,
        pages: usize,
        stop: StopReason,
    },
    /// 피드 오류로 이번 실행에서 포기한 아이템
    Failed {
        item_id: String,
        pages: usize,
        reason: String,
    },
    /// 취소/제한 시간으로 건너뛴 아이템
    Skipped { item_id: String, pages: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub item_id: String,
    pub reason: String,
}

/// 실행 종료 시 요약 (성공/실패/건너뜀)
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub succeeded: usize,
    pub failed: Vec<FailedItem>,
    pub skipped: Vec<String>,
    pub fetched_pages: usize,
    pub inserted: u64,
    pub dropped: usize,
}

impl IngestSummary {
    pub fn from_results(results: impl IntoIterator<Item = ItemResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result {
                ItemResult::Refreshed {
                    inserted,
                    dropped,
                    pages,
                    ..
                } => {
                    summary.succeeded += 1;
                    summary.inserted += inserted;
                    summary.dropped += dropped;
                    summary.fetched_pages += pages;
                }
                ItemResult::Failed {
                    item_id,
                    pages,
                    reason,
                } => {
                    summary.fetched_pages += pages;
                    summary.failed.push(FailedItem { item_id, reason });
                }
                ItemResult::Skipped { item_id, pages } => {
                    summary.fetched_pages += pages;
                    summary.skipped.push(item_id);
                }
            }
        }
        summary.failed.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        summary.skipped.sort();
        summary
    }

    pub fn failed_item_ids(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.item_id.as_str()).collect()
    }

    pub fn log(&self) {
        info!(
            "Ingestion finished: {} succeeded, {} failed, {} skipped ({} pages, {} new sales, {} dropped)",
            self.succeeded,
            self.failed.len(),
            self.skipped.len(),
            self.fetched_pages,
            self.inserted,
            self.dropped
        );
        for failed in &self.failed {
            warn!("  failed: {} ({})", failed.item_id, failed.reason);
        }
        if !self.skipped.is_empty() {
            warn!("  skipped: {}", self.skipped.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_folds_item_results() {
        let summary = IngestSummary::from_results(vec![
            ItemResult::Refreshed {
                item_id: "a".to_string(),
                inserted: 3,
                dropped: 1,
                pages: 2,
                stop: StopReason::KnownHistoryReached,
            },
            ItemResult::Failed {
                item_id: "q".to_string(),
                pages: 1,
                reason: "timeout".to_string(),
            },
            ItemResult::Skipped {
                item_id: "z".to_string(),
                pages: 0,
            },
            ItemResult::Refreshed {
                item_id: "b".to_string(),
                inserted: 0,
                dropped: 0,
                pages: 1,
                stop: StopReason::PageExhausted,
            },
        ]);

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.inserted, 3);
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.fetched_pages, 4);
        assert_eq!(summary.failed_item_ids(), vec!["q"]);
        assert_eq!(summary.skipped, vec!["z".to_string()]);
    }
}
