use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info, warn};

use interface::{FeedError, InventoryItem, Rarity, SeasonEligibility};

use super::{GraphqlClient, InventoryProvider};

/// 고정된 아이템 목록
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    items: Vec<InventoryItem>,
}

impl StaticInventory {
    pub fn new(items: Vec<InventoryItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl InventoryProvider for StaticInventory {
    async fn items(&self) -> Result<Vec<InventoryItem>, FeedError> {
        Ok(self.items.clone())
    }
}

/// JSON 배열 파일에서 아이템 목록을 읽는다
#[derive(Debug, Clone)]
pub struct JsonFileInventory {
    path: PathBuf,
}

impl JsonFileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InventoryProvider for JsonFileInventory {
    async fn items(&self) -> Result<Vec<InventoryItem>, FeedError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            FeedError::Other(format!(
                "Failed to read inventory file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let items: Vec<InventoryItem> = serde_json::from_str(&text).map_err(|e| {
            FeedError::Decode(format!(
                "Failed to parse inventory file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        info!("Loaded {} inventory items from {}", items.len(), self.path.display());
        Ok(items)
    }
}

const OWNED_CARDS_QUERY: &str = r#"
query OwnedCards($first: Int!, $after: String) {
  currentUser {
    cards(first: $first, after: $after) {
      nodes {
        slug
        rarity
        inSeasonEligible
        player { slug }
      }
      pageInfo {
        endCursor
        hasNextPage
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedCardsData {
    current_user: CurrentUser,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    cards: CardConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardConnection {
    #[serde(default)]
    nodes: Vec<OwnedCard>,
    page_info: ForwardPageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedCard {
    slug: String,
    rarity: Option<String>,
    #[serde(default)]
    in_season_eligible: bool,
    player: Option<PlayerRef>,
}

#[derive(Debug, Deserialize)]
struct PlayerRef {
    slug: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForwardPageInfo {
    end_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

/// 현재 사용자가 보유한 카드를 정방향으로 페이지네이션하여 아이템 목록을 만든다.
/// common 등급이나 등급이 없는 카드는 제외하고, 같은 (아이템, 등급, 시즌) 조합은 하나로 합친다.
#[derive(Clone)]
pub struct GraphqlInventory {
    client: GraphqlClient,
    page_size: u32,
}

impl GraphqlInventory {
    pub fn new(client: GraphqlClient, page_size: u32) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl InventoryProvider for GraphqlInventory {
    async fn items(&self) -> Result<Vec<InventoryItem>, FeedError> {
        let mut cards = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let variables = json!({ "first": self.page_size, "after": after });
            let data: OwnedCardsData = self.client.execute(OWNED_CARDS_QUERY, variables).await?;
            let conn = data.current_user.cards;
            debug!("fetched {} owned cards", conn.nodes.len());
            cards.extend(conn.nodes);

            if !conn.page_info.has_next_page {
                break;
            }
            match conn.page_info.end_cursor {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        let items = cards_to_items(cards);
        info!("Loaded {} inventory items from owned cards", items.len());
        Ok(items)
    }
}

fn cards_to_items(cards: Vec<OwnedCard>) -> Vec<InventoryItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for card in cards {
        let Some(player) = card.player else {
            warn!("card {} has no player, skipping", card.slug);
            continue;
        };
        let rarity = match card.rarity.as_deref().map(Rarity::from_str) {
            Some(Ok(Rarity::Common)) | None => continue,
            Some(Ok(r)) => r,
            Some(Err(e)) => {
                warn!("card {}: {}", card.slug, e);
                continue;
            }
        };
        let item = InventoryItem {
            item_id: player.slug,
            category: rarity,
            season_eligibility: SeasonEligibility::from_flag(card.in_season_eligible),
            purchase_price_minor: None,
        };
        if seen.insert((item.item_id.clone(), item.category, item.season_eligibility)) {
            items.push(item);
        }
    }

    items
}
