mod error;
mod memory;
mod record;
mod traits;

pub mod conformance;

pub use error::StorageError;
pub use memory::{MemoryStorage, MemoryTransaction};
pub use record::{
    ChangeSeverity, ChangeType, DocumentSnapshot, DomainEventRecord, RequiredAction,
    RequiredActionKind, ReviewRecord, ReviewStatus, VersionRecord,
};
pub use traits::LedgerStorage;
