use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Index, IndexOrder, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Schema, Statement, TransactionTrait,
};
use std::convert::TryInto;
use std::path::Path;
use tracing::{debug, info, warn};

use interface::{Rarity, SaleRecord, SeasonEligibility};

use super::entities::sale_record;
use super::interfaces::{check_invariants, parse_timestamp};
use super::{RecordError, SaleRecordRepository};

/// 한 INSERT 문에 담는 최대 행 수 (SQLite 바인딩 변수 제한)
const INSERT_CHUNK: usize = 100;
/// 윈도우 조회 시 IN 절에 담는 최대 아이템 수
const WINDOW_CHUNK: usize = 500;

const ITEM_DATE_INDEX: &str = "idx_sale_records_item_date";

/// SQLite 기반 거래 기록 저장소
#[derive(Clone)]
pub struct SqliteSaleRecordStore {
    db: DatabaseConnection,
}

impl SqliteSaleRecordStore {
    /// 파일 경로로 저장소를 연다. 상위 디렉토리가 없으면 만들고 스키마를 보장한다.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let mut path = db_path.as_ref().to_path_buf();
        if !path.is_absolute() {
            // 상대 경로인 경우 현재 디렉토리 기준
            if let Ok(current_dir) = std::env::current_dir() {
                path = current_dir.join(path);
            }
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RecordError::Other(format!("Failed to create DB directory: {}", e)))?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", path.to_string_lossy());
        Self::connect(&db_url).await
    }

    pub async fn connect(db_url: &str) -> Result<Self, RecordError> {
        info!("Connecting to SQLite database: {}", db_url);
        let db = Database::connect(db_url).await?;

        let store = Self { db };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 예전 스키마에서 seller_id가 NULL 허용이면, NULL 행을 지우고 NOT NULL 제약으로 테이블을 재구성한다.
    async fn migrate_nullable_seller(&self) -> Result<(), RecordError> {
        let backend = self.db.get_database_backend();
        let columns = self
            .db
            .query_all(Statement::from_string(
                backend,
                "PRAGMA table_info(sale_records)",
            ))
            .await?;

        // 테이블이 아직 없음
        if columns.is_empty() {
            return Ok(());
        }

        let mut seller_nullable = false;
        for column in &columns {
            let name: String = column.try_get("", "name")?;
            let notnull: i32 = column.try_get("", "notnull")?;
            if name == "seller_id" && notnull == 0 {
                seller_nullable = true;
            }
        }
        if !seller_nullable {
            return Ok(());
        }

        warn!("sale_records.seller_id is nullable, migrating legacy table");

        let schema = Schema::new(backend);
        let txn = self.db.begin().await?;

        let deleted = txn
            .execute_unprepared("DELETE FROM sale_records WHERE seller_id IS NULL")
            .await?
            .rows_affected();
        txn.execute_unprepared(&format!("DROP INDEX IF EXISTS {}", ITEM_DATE_INDEX))
            .await?;
        txn.execute_unprepared("ALTER TABLE sale_records RENAME TO sale_records_legacy")
            .await?;
        txn.execute(backend.build(&schema.create_table_from_entity(sale_record::Entity)))
            .await?;
        txn.execute_unprepared(
            "INSERT INTO sale_records \
             (id, item_id, category, variant_id, season_flag, price, buyer_id, seller_id, date) \
             SELECT id, item_id, category, variant_id, season_flag, price, buyer_id, seller_id, date \
             FROM sale_records_legacy",
        )
        .await?;
        txn.execute_unprepared("DROP TABLE sale_records_legacy")
            .await?;
        txn.commit().await?;

        info!(
            "Legacy sale_records migrated ({} rows without seller removed)",
            deleted
        );
        Ok(())
    }

    async fn load_window_chunk(
        &self,
        item_ids: &[String],
        limit: u64,
    ) -> Result<Vec<SaleRecord>, RecordError> {
        let placeholders = vec!["?"; item_ids.len()].join(", ");
        let sql = format!(
            "WITH ranked AS ( \
               SELECT *, ROW_NUMBER() OVER (PARTITION BY item_id ORDER BY date DESC) AS rn \
               FROM sale_records \
               WHERE item_id IN ({}) \
             ) \
             SELECT id, item_id, category, variant_id, season_flag, price, buyer_id, seller_id, date \
             FROM ranked \
             WHERE rn <= ? \
             ORDER BY item_id, date DESC",
            placeholders
        );

        let mut values: Vec<sea_orm::Value> =
            item_ids.iter().map(|id| id.clone().into()).collect();
        values.push((limit.min(i64::MAX as u64) as i64).into());

        let models = sale_record::Entity::find()
            .from_raw_sql(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                sql,
                values,
            ))
            .all(&self.db)
            .await?;

        models.into_iter().map(|m| m.try_into()).collect()
    }
}

#[async_trait]
impl SaleRecordRepository for SqliteSaleRecordStore {
    async fn ensure_schema(&self) -> Result<(), RecordError> {
        self.migrate_nullable_seller().await?;

        // SeaORM SchemaBuilder를 사용하여 테이블 및 인덱스 생성
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        // 테이블 생성 (IF NOT EXISTS)
        let mut create_table_stmt = schema.create_table_from_entity(sale_record::Entity);
        create_table_stmt.if_not_exists();
        self.db.execute(backend.build(&create_table_stmt)).await?;

        let mut item_date_idx = Index::create()
            .name(ITEM_DATE_INDEX)
            .table(sale_record::Entity)
            .col(sale_record::Column::ItemId)
            .col((sale_record::Column::Date, IndexOrder::Desc))
            .to_owned();
        item_date_idx.if_not_exists();
        self.db.execute(backend.build(&item_date_idx)).await?;

        debug!("Sale records table initialized");
        Ok(())
    }

    async fn max_date(&self, item_id: &str) -> Result<Option<DateTime<Utc>>, RecordError> {
        let latest = sale_record::Entity::find()
            .filter(sale_record::Column::ItemId.eq(item_id))
            .order_by_desc(sale_record::Column::Date)
            .one(&self.db)
            .await?;

        latest.map(|m| parse_timestamp(&m.date)).transpose()
    }

    async fn partition_max_date(
        &self,
        item_id: &str,
        category: Rarity,
        season_eligibility: SeasonEligibility,
    ) -> Result<Option<DateTime<Utc>>, RecordError> {
        let latest = sale_record::Entity::find()
            .filter(sale_record::Column::ItemId.eq(item_id))
            .filter(sale_record::Column::Category.eq(category.to_string()))
            .filter(sale_record::Column::SeasonFlag.eq(season_eligibility.as_flag()))
            .order_by_desc(sale_record::Column::Date)
            .one(&self.db)
            .await?;

        latest.map(|m| parse_timestamp(&m.date)).transpose()
    }

    async fn upsert(&self, records: &[SaleRecord]) -> Result<u64, RecordError> {
        if records.is_empty() {
            return Ok(0);
        }
        for record in records {
            check_invariants(record)?;
        }

        let txn = self.db.begin().await?;
        let mut inserted = 0;

        for chunk in records.chunks(INSERT_CHUNK) {
            let models: Vec<sale_record::ActiveModel> =
                chunk.iter().map(sale_record::ActiveModel::from).collect();

            // 단일 INSERT ... ON CONFLICT(id) DO NOTHING 문으로 처리 (읽고 쓰기 분리 없음)
            inserted += sale_record::Entity::insert_many(models)
                .on_conflict(
                    OnConflict::column(sale_record::Column::Id)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(inserted)
    }

    async fn load_window(
        &self,
        item_ids: &[String],
        limit: u64,
    ) -> Result<Vec<SaleRecord>, RecordError> {
        if item_ids.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for chunk in item_ids.chunks(WINDOW_CHUNK) {
            records.extend(self.load_window_chunk(chunk, limit).await?);
        }
        Ok(records)
    }

    async fn count(&self, item_id: Option<&str>) -> Result<u64, RecordError> {
        let mut query = sale_record::Entity::find();
        if let Some(item_id) = item_id {
            query = query.filter(sale_record::Column::ItemId.eq(item_id));
        }
        Ok(query.count(&self.db).await?)
    }
}
