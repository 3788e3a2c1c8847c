//! Authentication session lifecycle

pub mod scheduler;
pub mod session;
pub mod state;


// Re-export commonly used items
pub use scheduler::{RefreshScheduler, RefreshSchedulerHandle};
pub use session::SessionManager;
pub use state::{SessionSnapshot, SessionStatus};
