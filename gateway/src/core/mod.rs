pub mod call;
pub mod media;
pub mod pipeline;
pub mod realtime;
pub mod session;

// Re-export commonly used types for convenience
pub use call::{CallControl, CallState, CallType, ConversationMessage, GoodbyeDetector, Role};
pub use media::{MediaEvent, MediaRoute, MediaTransport};
pub use realtime::{
    BaseRealtime, BoxedRealtime, OpenAIRealtime, RealtimeConfig, RealtimeError, RealtimeEvent,
    RealtimeResult, create_realtime_provider,
};
pub use session::{
    BoxedCallSession, CallSession, SessionError, SessionManager, SessionResult, SessionSignal,
};
