//! Command-line interface for toonlate.

mod commands;
pub mod icons;
pub mod progress;

pub use commands::{is_verbose, run};
