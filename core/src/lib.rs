//! Root of the `sift-core` library.

// Prevent accidental direct writes to stdout/stderr in library code. All
// user-visible output must go through the event queue or the tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod accumulator;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod error;
pub mod flags;
pub mod history;
pub mod navigator;
mod session;
pub mod transport;

pub use controller::Disposition;
pub use controller::SessionController;
pub use history::SessionHistory;
pub use navigator::Navigator;
pub use session::Session;
pub use session::connector_for_config;

pub use sift_protocol::protocol;
