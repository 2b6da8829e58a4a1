//! Background jobs the host runtime spawns alongside the distributor

pub mod session_sweeper;

pub use session_sweeper::{spawn_session_sweeper, start_session_sweeper};
