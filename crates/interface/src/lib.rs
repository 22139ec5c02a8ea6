use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// 카드 등급. 원격 피드의 파티션을 결정한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Limited,
    Rare,
    SuperRare,
    Unique,
    CustomSeries,
}

impl Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rarity::Common => write!(f, "common"),
            Rarity::Limited => write!(f, "limited"),
            Rarity::Rare => write!(f, "rare"),
            Rarity::SuperRare => write!(f, "super_rare"),
            Rarity::Unique => write!(f, "unique"),
            Rarity::CustomSeries => write!(f, "custom_series"),
        }
    }
}

impl FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "common" => Ok(Rarity::Common),
            "limited" => Ok(Rarity::Limited),
            "rare" => Ok(Rarity::Rare),
            "super_rare" => Ok(Rarity::SuperRare),
            "unique" => Ok(Rarity::Unique),
            "custom_series" => Ok(Rarity::CustomSeries),
            _ => Err(format!("Invalid Rarity: {}", s)),
        }
    }
}

/// 시즌 적격 여부. DB에는 BOOLEAN(season_flag)으로 저장된다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeasonEligibility {
    /// 현재 시즌 카드
    InSeason,
    /// 지난 시즌 카드
    Classic,
}

impl SeasonEligibility {
    pub fn from_flag(in_season: bool) -> Self {
        if in_season {
            SeasonEligibility::InSeason
        } else {
            SeasonEligibility::Classic
        }
    }

    pub fn as_flag(&self) -> bool {
        matches!(self, SeasonEligibility::InSeason)
    }
}

impl Display for SeasonEligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeasonEligibility::InSeason => write!(f, "IN_SEASON"),
            SeasonEligibility::Classic => write!(f, "CLASSIC"),
        }
    }
}

/// 저장소에 기록되는 거래 한 건. 한 번 저장되면 변경되지 않는다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    /// 피드가 부여한 고유 ID (중복 제거 키)
    pub id: String,
    /// 거래된 아이템 (예: 선수 slug)
    pub item_id: String,
    pub category: Rarity,
    /// 판매된 카드 slug
    pub variant_id: String,
    pub season_eligibility: SeasonEligibility,
    /// 가격 (최소 화폐 단위, 예: 유로 센트)
    pub price_minor: i64,
    pub buyer_id: Option<String>,
    /// 판매자. 판매자가 없는 거래(발행, 경매 정산)는 저장하지 않는다.
    pub seller_id: String,
    pub date: DateTime<Utc>,
}

/// 피드에서 내려온 원본 노드. 아직 검증되지 않았다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleNode {
    pub id: String,
    pub price_minor: Option<i64>,
    pub date: DateTime<Utc>,
    pub buyer_id: Option<String>,
    pub seller_id: Option<String>,
    pub variant_id: String,
    pub season_flag: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 다음(더 오래된) 페이지 요청 시 before 커서로 사용
    pub start_cursor: Option<String>,
    pub has_previous_page: bool,
}

/// 역방향 페이지네이션 응답 한 페이지 (최신 순)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalePage {
    pub nodes: Vec<SaleNode>,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRequest {
    pub item_id: String,
    pub category: Rarity,
    pub season_eligibility: SeasonEligibility,
    pub before: Option<String>,
    pub page_size: u32,
}

/// 추적 대상 아이템. 인벤토리 제공자가 결정한다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryItem {
    pub item_id: String,
    pub category: Rarity,
    pub season_eligibility: SeasonEligibility,
    #[serde(default)]
    pub purchase_price_minor: Option<i64>,
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("other error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rarity_text_round_trips() {
        for rarity in [
            Rarity::Common,
            Rarity::Limited,
            Rarity::Rare,
            Rarity::SuperRare,
            Rarity::Unique,
            Rarity::CustomSeries,
        ] {
            assert_eq!(Rarity::from_str(&rarity.to_string()), Ok(rarity));
        }
        assert!(Rarity::from_str("legendary").is_err());
    }

    #[test]
    fn season_flag_maps_to_eligibility() {
        assert_eq!(SeasonEligibility::from_flag(true), SeasonEligibility::InSeason);
        assert!(!SeasonEligibility::Classic.as_flag());
    }

    #[test]
    fn inventory_item_purchase_price_is_optional() {
        let item: InventoryItem = serde_json::from_str(
            r#"{"item_id":"kylian-mbappe","category":"super_rare","season_eligibility":"IN_SEASON"}"#,
        )
        .unwrap();
        assert_eq!(item.category, Rarity::SuperRare);
        assert_eq!(item.purchase_price_minor, None);
    }
}
