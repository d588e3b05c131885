mod id;
mod id_generator;
mod transaction;

pub use id::{Id, IdError};
pub use id_generator::{FixedIdGenerator, IdGenerator, UuidIdGenerator};
pub(crate) use transaction::adopt_legacy_keys;
pub use transaction::{
    PaymentDate, TransactionDraft, TransactionPatch, TransactionRecord, TransactionStatus,
    TransactionType,
};
