pub mod realtime;
pub mod signal;
pub mod stt;

// Re-export commonly used types for convenience
pub use realtime::{
    LiveClient, LiveConfig, LiveSignals, Part, ReadyState, RealtimeError, RealtimeResult,
};
pub use signal::{Listener, ListenerId, Signal};
pub use stt::{SttClient, SttOptions};
