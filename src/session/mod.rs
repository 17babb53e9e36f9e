//! Interactive session recording: durable on-disk state, a reconnecting
//! recorder, and derivation of reusable tools from the action log.

pub mod derive;
pub mod recorder;
pub mod store;

pub use derive::{derive_tools, to_proposals, SessionStep, SessionStepKind, SessionTool};
pub use recorder::SessionRecorder;
pub use store::{ActionLogEntry, SessionState, SessionStore};
