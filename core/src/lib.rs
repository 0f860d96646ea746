pub mod error;
pub mod id;
pub mod ledger;
pub mod operation;
pub mod storage;
pub mod tracked;
pub mod transaction;
pub mod value;

pub use error::{CompensationFault, MutationError, RollbackError, StorageError, TransactionError};
pub use id::{OperationId, TargetId, TransactionId};
pub use ledger::{Ledger, OperationQuery};
pub use operation::{Compensation, Operation, OperationDraft, Outcome, RemoteCompensation};
pub use storage::{StorageCollection, StorageCollectionWrapper, StorageEngine};
pub use tracked::{TrackedCell, TrackedMap, TrackedVec};
pub use transaction::Transaction;
pub use value::{TrackedValue, Value};
