use async_trait::async_trait;

use interface::{FeedError, FeedRequest, InventoryItem, SalePage};

pub mod graphql;
pub mod inventory;
pub mod sales;

/// 아이템 하나의 거래 내역을 최신 순으로 역방향 페이지네이션하는 원격 피드
#[async_trait]
pub trait SaleFeed: Send + Sync {
    async fn fetch_page(&self, request: &FeedRequest) -> Result<SalePage, FeedError>;
}

/// 갱신 대상 아이템 목록 제공자
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    async fn items(&self) -> Result<Vec<InventoryItem>, FeedError>;
}

// Convenience re-exports
pub use graphql::{GraphqlClient, DEFAULT_ENDPOINT};
pub use inventory::{GraphqlInventory, JsonFileInventory, StaticInventory};
pub use sales::GraphqlSaleFeed;
