/// 거래 기록 엔티티 모듈
pub mod sale_record {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "sale_records")]
    pub struct Model {
        /// 피드가 부여한 고유 ID
        #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
        pub id: String,

        /// 아이템 ID (선수 slug)
        #[sea_orm(column_type = "Text")]
        pub item_id: String,

        /// 카드 등급 (limited, rare, ...)
        #[sea_orm(column_type = "Text", nullable)]
        pub category: Option<String>,

        /// 판매된 카드 slug
        #[sea_orm(column_type = "Text", nullable)]
        pub variant_id: Option<String>,

        /// 시즌 적격 여부
        #[sea_orm(column_type = "Boolean", nullable)]
        pub season_flag: Option<bool>,

        /// 가격 (최소 화폐 단위)
        #[sea_orm(column_type = "BigInteger", nullable)]
        pub price: Option<i64>,

        #[sea_orm(column_type = "Text", nullable)]
        pub buyer_id: Option<String>,

        /// 판매자 (NOT NULL)
        #[sea_orm(column_type = "Text")]
        pub seller_id: String,

        /// 거래 UTC 시간 (고정 폭 RFC 3339, 사전식 정렬 = 시간순 정렬)
        #[sea_orm(column_type = "Text")]
        pub date: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
