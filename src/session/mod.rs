//! Document sessions
//!
//! An upload becomes a session: an opaque UUID token, a working directory
//! holding the uploaded file and its processed copies, and (for encrypted
//! uploads) the authenticated document handle. Sessions expire after a
//! configurable TTL and are swept by a background task.

pub mod store;
pub mod types;

pub use store::SessionStore;
pub use types::*;
