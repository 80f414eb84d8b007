//! Record persistence for the harvester.
//!
//! [`RecordStore`] is the upsert-by-id collection the scheduler writes into;
//! [`CheckpointStore`] keeps the scheduler cursor across restarts. Both are
//! implemented by [`PgRecordStore`] (production) and [`MemoryRecordStore`].

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;
pub use store::{CheckpointStore, RecordStore};
