pub mod entities;
pub mod interfaces;
pub mod sqlite;

pub use interfaces::{RecordError, SaleRecordRepository};
pub use sqlite::SqliteSaleRecordStore;
