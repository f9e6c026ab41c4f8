//! Recording session lifecycle.
//!
//! This module provides:
//! - `Session`: one recording in progress for one channel-group
//! - `SessionRegistry`: admission control (at most one active session per
//!   channel-group), the only state shared across concurrent operations
//! - `Recorder`: the start/stop pipeline tying capture, track finalization,
//!   mixing and archival together

mod pipeline;
mod registry;
mod session;

pub use pipeline::{Recorder, RecorderConfig, StartError, StartReceipt, StopError, StopSummary};
pub use registry::{AlreadyActiveError, SessionRegistry, StopRejection};
pub use session::{Session, SessionStatus};
