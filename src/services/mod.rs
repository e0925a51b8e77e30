//! Services shared by the library and command-line frontends

pub mod status;

pub use status::{StatusReporter, STATUS_PREFIX};
