pub mod pager;
pub mod summary;

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::{stream, StreamExt, TryStreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use feed::{InventoryProvider, SaleFeed};
use interface::{FeedError, FeedRequest, InventoryItem, SalePage, SaleRecord};

use crate::config::IngestConfig;
use crate::record::{RecordError, SaleRecordRepository};

pub use pager::{ItemOutcome, ItemPager, PagerState, StopReason};
pub use summary::{FailedItem, IngestSummary, ItemResult};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 저장소/스키마 오류. 실행 전체를 중단한다.
    #[error("record store error: {0}")]
    Record(#[from] RecordError),

    #[error("inventory error: {0}")]
    Inventory(#[from] FeedError),
}

/// 한 번의 갱신 실행 결과: 요약과 아이템별 최신 윈도우
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub summary: IngestSummary,
    pub window: Vec<SaleRecord>,
}

/// 원격 피드와 저장소를 맞추는 수집 코디네이터.
/// 아이템마다 워터마크까지만 역방향으로 페이지를 읽으므로 비용은 새 거래 수에 비례한다.
pub struct IngestionCoordinator {
    store: Arc<dyn SaleRecordRepository>,
    feed: Arc<dyn SaleFeed>,
    config: IngestConfig,
}

impl IngestionCoordinator {
    pub fn new(
        store: Arc<dyn SaleRecordRepository>,
        feed: Arc<dyn SaleFeed>,
        config: IngestConfig,
    ) -> Self {
        Self {
            store,
            feed,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// 인벤토리 제공자에서 아이템을 받아 갱신한다
    pub async fn refresh_inventory(
        &self,
        inventory: &dyn InventoryProvider,
        cancel: &CancellationToken,
    ) -> Result<RefreshReport, IngestError> {
        let items = inventory.items().await?;
        self.refresh(&items, cancel).await
    }

    /// 아이템들을 갱신한 뒤, 전체 아이템에 대해 최신 `total_limit`건 윈도우를 한 번에 읽는다.
    /// 아이템 단위 피드 오류는 요약에만 남고, 저장소 오류만 `Err`로 전파된다.
    pub async fn refresh(
        &self,
        items: &[InventoryItem],
        cancel: &CancellationToken,
    ) -> Result<RefreshReport, IngestError> {
        if items.is_empty() {
            info!("Inventory is empty, nothing to refresh");
            return Ok(RefreshReport::default());
        }

        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        info!(
            "Refreshing {} items (page_size: {}, total_limit: {}, concurrency: {})",
            items.len(),
            self.config.page_size,
            self.config.total_limit,
            self.config.concurrency
        );

        let results: Vec<ItemResult> = if self.config.concurrency <= 1 {
            let mut results = Vec::with_capacity(items.len());
            for item in items {
                results.push(self.ingest_item(item.clone(), cancel, deadline).await?);
            }
            results
        } else {
            stream::iter(items.iter().cloned())
                .map(|item| self.ingest_item(item, cancel, deadline))
                .buffer_unordered(self.config.concurrency)
                .try_collect::<Vec<_>>()
                .await?
        };

        let summary = IngestSummary::from_results(results);
        summary.log();

        let item_ids: Vec<String> = items
            .iter()
            .map(|i| i.item_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let window = self
            .store
            .load_window(&item_ids, self.config.total_limit)
            .await?;

        Ok(RefreshReport { summary, window })
    }

    async fn ingest_item(
        &self,
        item: InventoryItem,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<ItemResult, RecordError> {
        let item_id = item.item_id.clone();
        if is_stopped(cancel, deadline) {
            return Ok(ItemResult::Skipped { item_id, pages: 0 });
        }

        let watermark = self
            .store
            .partition_max_date(&item_id, item.category, item.season_eligibility)
            .await?;
        debug!("{}: watermark {:?}", item_id, watermark);

        let mut pager = ItemPager::new(
            item,
            watermark,
            self.config.page_size,
            self.config.total_limit,
        );

        while let Some(request) = pager.next_request() {
            if is_stopped(cancel, deadline) {
                pager.cancel();
                break;
            }
            match self.fetch_page(&request, cancel, deadline).await {
                Some(Ok(page)) => pager.absorb(page),
                Some(Err(e)) => {
                    warn!("Failed to refresh {}: {}", item_id, e);
                    return Ok(ItemResult::Failed {
                        item_id,
                        pages: pager.pages(),
                        reason: e.to_string(),
                    });
                }
                None => pager.cancel(),
            }
        }

        let outcome = pager.finish();
        if outcome.stop == StopReason::Cancelled {
            // 부분 버퍼를 쓰면 워터마크가 앞당겨져 그 아래 거래를 다시 받지 못하므로 버린다
            info!(
                "{}: cancelled after {} pages, {} fetched sales discarded",
                item_id,
                outcome.pages,
                outcome.accepted.len()
            );
            return Ok(ItemResult::Skipped {
                item_id,
                pages: outcome.pages,
            });
        }

        let inserted = self.store.upsert(&outcome.accepted).await?;
        info!(
            "{}: {} new sales stored ({} pages, {} dropped, stop: {:?})",
            item_id, inserted, outcome.pages, outcome.dropped, outcome.stop
        );

        Ok(ItemResult::Refreshed {
            item_id,
            inserted,
            dropped: outcome.dropped,
            pages: outcome.pages,
            stop: outcome.stop,
        })
    }

    /// 취소되거나 제한 시간이 지나면 None
    async fn fetch_page(
        &self,
        request: &FeedRequest,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Option<Result<SalePage, FeedError>> {
        let deadline_reached = async {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => None,
            _ = deadline_reached => None,
            result = self.feed.fetch_page(request) => Some(result),
        }
    }
}

fn is_stopped(cancel: &CancellationToken, deadline: Option<Instant>) -> bool {
    cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d)
}
