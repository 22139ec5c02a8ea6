use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use interface::{FeedError, FeedRequest, PageInfo, SaleNode, SalePage};

use super::{GraphqlClient, SaleFeed};

const SALE_PRICES_QUERY: &str = r#"
query SalePrices($playerSlug: String!, $rarity: Rarity!, $seasonEligibility: SeasonEligibility, $last: Int!, $before: String) {
  tokens {
    tokenPrices(playerSlug: $playerSlug, rarity: $rarity, seasonEligibility: $seasonEligibility, last: $last, before: $before) {
      nodes {
        id
        date
        amounts { eurCents }
        card { slug inSeasonEligible }
        buyer { slug }
        seller { slug }
      }
      pageInfo {
        startCursor
        hasPreviousPage
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SalePricesData {
    tokens: TokensField,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokensField {
    token_prices: TokenPriceConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPriceConnection {
    #[serde(default)]
    nodes: Vec<TokenPriceNode>,
    page_info: GraphqlPageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPriceNode {
    id: String,
    date: DateTime<Utc>,
    amounts: Option<Amounts>,
    card: CardRef,
    buyer: Option<UserRef>,
    seller: Option<UserRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Amounts {
    eur_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardRef {
    slug: String,
    #[serde(default)]
    in_season_eligible: bool,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    slug: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlPageInfo {
    start_cursor: Option<String>,
    #[serde(default)]
    has_previous_page: bool,
}

impl From<TokenPriceConnection> for SalePage {
    fn from(conn: TokenPriceConnection) -> Self {
        // 연결은 페이지 안에서 오래된 순으로 오므로 최신 순으로 맞춘다
        let mut nodes: Vec<SaleNode> = conn
            .nodes
            .into_iter()
            .map(|node| SaleNode {
                id: node.id,
                price_minor: node.amounts.and_then(|a| a.eur_cents),
                date: node.date,
                buyer_id: node.buyer.map(|u| u.slug),
                seller_id: node.seller.map(|u| u.slug),
                variant_id: node.card.slug,
                season_flag: node.card.in_season_eligible,
            })
            .collect();
        nodes.sort_by(|a, b| b.date.cmp(&a.date));

        SalePage {
            nodes,
            page_info: PageInfo {
                start_cursor: conn.page_info.start_cursor,
                has_previous_page: conn.page_info.has_previous_page,
            },
        }
    }
}

/// GraphQL `tokenPrices` 연결을 사용하는 원격 거래 피드
#[derive(Clone)]
pub struct GraphqlSaleFeed {
    client: GraphqlClient,
}

impl GraphqlSaleFeed {
    pub fn new(client: GraphqlClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SaleFeed for GraphqlSaleFeed {
    async fn fetch_page(&self, request: &FeedRequest) -> Result<SalePage, FeedError> {
        let variables = json!({
            "playerSlug": request.item_id,
            "rarity": request.category.to_string(),
            "seasonEligibility": request.season_eligibility.to_string(),
            "last": request.page_size,
            "before": request.before,
        });

        let data: SalePricesData = self.client.execute(SALE_PRICES_QUERY, variables).await?;
        let page = SalePage::from(data.tokens.token_prices);

        debug!(
            "fetched {} sale nodes for {} (has_previous_page: {})",
            page.nodes.len(),
            request.item_id,
            page.page_info.has_previous_page
        );

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_maps_to_sale_page() {
        let raw = r#"{
            "tokens": {
                "tokenPrices": {
                    "nodes": [
                        {
                            "id": "TokenPrice:1",
                            "date": "2025-09-01T12:00:00Z",
                            "amounts": { "eurCents": 1250 },
                            "card": { "slug": "player-2025-limited-12", "inSeasonEligible": true },
                            "buyer": { "slug": "alice" },
                            "seller": { "slug": "bob" }
                        },
                        {
                            "id": "TokenPrice:2",
                            "date": "2025-08-30T08:00:00Z",
                            "amounts": null,
                            "card": { "slug": "player-2024-limited-3" },
                            "buyer": { "slug": "carol" },
                            "seller": null
                        }
                    ],
                    "pageInfo": { "startCursor": "abc", "hasPreviousPage": true }
                }
            }
        }"#;

        let data: SalePricesData = serde_json::from_str(raw).unwrap();
        let page = SalePage::from(data.tokens.token_prices);

        assert_eq!(page.nodes.len(), 2);
        assert_eq!(page.nodes[0].id, "TokenPrice:1");
        assert_eq!(page.nodes[0].price_minor, Some(1250));
        assert_eq!(page.nodes[0].seller_id.as_deref(), Some("bob"));
        assert!(page.nodes[0].season_flag);
        assert_eq!(page.nodes[1].price_minor, None);
        assert_eq!(page.nodes[1].seller_id, None);
        assert!(!page.nodes[1].season_flag);
        assert_eq!(page.page_info.start_cursor.as_deref(), Some("abc"));
        assert!(page.page_info.has_previous_page);
    }

    #[test]
    fn page_nodes_are_ordered_newest_first() {
        let raw = r#"{
            "nodes": [
                { "id": "old", "date": "2025-01-01T00:00:00Z", "card": { "slug": "c" } },
                { "id": "new", "date": "2025-01-03T00:00:00Z", "card": { "slug": "c" } },
                { "id": "mid", "date": "2025-01-02T00:00:00Z", "card": { "slug": "c" } }
            ],
            "pageInfo": { "startCursor": null, "hasPreviousPage": false }
        }"#;

        let conn: TokenPriceConnection = serde_json::from_str(raw).unwrap();
        let page = SalePage::from(conn);
        let ids: Vec<&str> = page.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
        assert!(!page.page_info.has_previous_page);
    }
}
