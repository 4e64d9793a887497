//! Persisted outputs of a run: the JSON artifact layout and the SQLite run
//! history.

pub mod layout;
pub mod models;
pub mod store;
pub mod util;

pub use layout::OutputLayout;
pub use models::{RunMetadata, RunRecord, RunStatus};
pub use store::{RunStore, StoreError, StoreResult, CURRENT_SCHEMA_VERSION};
