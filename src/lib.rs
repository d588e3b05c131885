pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod normalize;
pub mod storage;

pub use error::LedgerError;
pub use ledger::{LedgerRepository, LedgerSummary, ListQuery, QueryFilter};
pub use normalize::{FieldNormalizer, RawInput};
pub use storage::{BackendKind, BackendSelector, LedgerStorage};
