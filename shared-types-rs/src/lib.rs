// shared-types-rs/src/lib.rs
// Data model shared by every crate of the repair engine.
//
// - `model`: execution results, code versions and patches
// - `session`: the DebugSession aggregate root and its invariants
// - `diff`: unified-diff rendering and replay

pub mod diff;
pub mod model;
pub mod session;

pub use diff::{apply_or_original, reconstruct_from_diff, unified_diff, DiffError};
pub use model::{
    CodeVersion, ErrorType, ExecutionResult, ExecutionStatus, Patch, PatchSource,
};
pub use session::{DebugSession, SessionError, SessionStatus, StatusSummary};
