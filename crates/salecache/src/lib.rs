pub mod config;
pub mod ingest;
pub mod logger;
pub mod record;
pub mod valuation;

pub use config::{AppConfig, ConfigError, FeedConfig, IngestConfig, ValuationConfig};
pub use ingest::{IngestError, IngestSummary, IngestionCoordinator, RefreshReport};
pub use record::{RecordError, SaleRecordRepository, SqliteSaleRecordStore};
pub use valuation::{estimate, sweep, weighted_median, ValuationEstimate, ValuationTable};

#[ctor::ctor]
fn load_dotenv() {
    let _ = dotenv::dotenv();
}
