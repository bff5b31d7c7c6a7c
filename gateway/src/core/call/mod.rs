//! Call-level state and the collaborators a session talks to.

pub mod control;
pub mod goodbye;
pub mod prompt;
pub mod state;

pub use control::{
    CallControl, CallControlError, CallControlResult, NoopCallControl, TwilioCallControl,
    spawn_end_call, spawn_start_recording,
};
pub use goodbye::{DEFAULT_GOODBYE_PHRASES, GoodbyeDetector};
pub use prompt::{OutboundPromptBuilder, PromptBuilder};
pub use state::{CallState, CallType, ConversationMessage, Role};
