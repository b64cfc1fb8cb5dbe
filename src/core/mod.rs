pub mod outcome;
pub mod types;

pub use outcome::{OperationOutcome, OutcomeKind};
pub use types::{
    ManagerCategory, Operation, OperationKind, Options, PackageRecord, PackageStatus,
    PlannedAction,
};
