//! Public extension contracts linking the session to the surrounding application.
//!
//! The crate never renders UI or routes users; it only tells an installed
//! [`SessionObserver`] that the session can no longer be renewed.

pub mod session_observer;

pub use session_observer::*;
