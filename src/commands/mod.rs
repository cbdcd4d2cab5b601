//! Command implementations
//!
//! Each module corresponds to one mode of the CLI.

pub mod erase;
pub mod init_session;
pub mod kill;

pub use erase::{run as erase_run, EraseConfig};
pub use kill::run as kill_run;
