use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::Set;
use std::convert::TryFrom;
use std::str::FromStr;

use interface::{Rarity, SaleRecord, SeasonEligibility};

use super::entities::sale_record;

/// 거래 기록 저장소 인터페이스
#[async_trait]
pub trait SaleRecordRepository: Send + Sync {
    /// 테이블과 (item_id, date DESC) 인덱스 생성. 매 시작 시 호출해도 안전하다.
    async fn ensure_schema(&self) -> Result<(), RecordError>;

    /// 아이템의 가장 최근 거래 시각 (모든 등급/시즌 합산)
    async fn max_date(&self, item_id: &str) -> Result<Option<DateTime<Utc>>, RecordError>;

    /// (아이템, 등급, 시즌) 파티션의 가장 최근 거래 시각. 수집 워터마크로 쓰인다.
    async fn partition_max_date(
        &self,
        item_id: &str,
        category: Rarity,
        season_eligibility: SeasonEligibility,
    ) -> Result<Option<DateTime<Utc>>, RecordError>;

    /// 아직 없는 ID만 삽입하고 충돌은 무시한다. 실제로 삽입된 행 수를 반환.
    async fn upsert(&self, records: &[SaleRecord]) -> Result<u64, RecordError>;

    /// 아이템별 최신 `limit`건 (아이템, 날짜 내림차순)
    async fn load_window(
        &self,
        item_ids: &[String],
        limit: u64,
    ) -> Result<Vec<SaleRecord>, RecordError>;

    /// 저장된 행 수. `item_id`가 주어지면 해당 아이템만 센다.
    async fn count(&self, item_id: Option<&str>) -> Result<u64, RecordError>;
}

/// 기록 저장소 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// 저장된 행을 SaleRecord로 되돌릴 수 없는 경우
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 검증 단계를 우회한 기록을 저장하려 한 경우. 실행 전체를 중단한다.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Other error: {0}")]
    Other(String),
}

pub(crate) fn format_timestamp(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RecordError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| RecordError::Serialization(format!("Failed to parse date {}: {}", raw, e)))
}

/// 저장 전 불변식 검사: 판매자 필수, 가격 음수 불가
pub(crate) fn check_invariants(record: &SaleRecord) -> Result<(), RecordError> {
    if record.seller_id.trim().is_empty() {
        return Err(RecordError::SchemaViolation(format!(
            "sale {} of {} has no seller",
            record.id, record.item_id
        )));
    }
    if record.price_minor < 0 {
        return Err(RecordError::SchemaViolation(format!(
            "sale {} of {} has negative price {}",
            record.id, record.item_id, record.price_minor
        )));
    }
    Ok(())
}

impl From<&SaleRecord> for sale_record::ActiveModel {
    fn from(record: &SaleRecord) -> Self {
        sale_record::ActiveModel {
            id: Set(record.id.clone()),
            item_id: Set(record.item_id.clone()),
            category: Set(Some(record.category.to_string())),
            variant_id: Set(Some(record.variant_id.clone())),
            season_flag: Set(Some(record.season_eligibility.as_flag())),
            price: Set(Some(record.price_minor)),
            buyer_id: Set(record.buyer_id.clone()),
            seller_id: Set(record.seller_id.clone()),
            date: Set(format_timestamp(&record.date)),
        }
    }
}

/// SeaORM sale_record::Model을 SaleRecord로 변환
impl TryFrom<sale_record::Model> for SaleRecord {
    type Error = RecordError;

    fn try_from(model: sale_record::Model) -> Result<Self, Self::Error> {
        let date = parse_timestamp(&model.date)?;

        let category = model
            .category
            .as_deref()
            .ok_or_else(|| RecordError::Serialization(format!("sale {} has no category", model.id)))
            .and_then(|c| Rarity::from_str(c).map_err(RecordError::Serialization))?;

        let price_minor = model
            .price
            .ok_or_else(|| RecordError::Serialization(format!("sale {} has no price", model.id)))?;

        Ok(SaleRecord {
            id: model.id,
            item_id: model.item_id,
            category,
            variant_id: model.variant_id.unwrap_or_default(),
            season_eligibility: SeasonEligibility::from_flag(model.season_flag.unwrap_or(false)),
            price_minor,
            buyer_id: model.buyer_id,
            seller_id: model.seller_id,
            date,
        })
    }
}
