// ABOUTME: Branch topology, subbranch path resolution and the branch lifecycle
//
// Lifecycle transitions are methods on BranchManager, split by operation:
// create, switch (SetBranch), sync, promote, delete, and query for the
// read-mostly operations.

pub mod create;
pub mod delete;
pub mod error;
pub mod manager;
pub mod promote;
pub mod query;
pub mod resolver;
pub mod switch;
pub mod sync;
pub mod topology;

pub use create::CreateOutcome;
pub use delete::DeleteOutcome;
pub use error::{BranchError, BranchResult, ErrorKind, PolicyError};
pub use manager::{BranchManager, WorkingCopy};
pub use promote::PromoteOutcome;
pub use query::{BranchInfo, BranchListing, InitOutcome, SubbranchInfo};
pub use resolver::{plan_switch, Alignment, ParentWorkingCopy, SwitchPlan};
pub use switch::SwitchOutcome;
pub use sync::SyncOutcome;
