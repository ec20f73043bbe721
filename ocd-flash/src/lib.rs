//! Flash an ELF firmware image onto a microcontroller.
//!
//! The image is turned into a flat binary with `objcopy` and then written,
//! verified and started with OpenOCD. Both tools run as child processes inside
//! a temporary workspace that is removed once flashing is done.

pub mod config;
pub mod error;
pub mod flash;
pub mod invocation;
pub mod logging;
pub mod runner;
pub mod toolchain;
pub mod workspace;

pub use config::{Config, Configs};
pub use error::FlashError;
pub use flash::{resolve_artifact, FlashPlan, Orchestrator};
pub use invocation::Stage;
pub use runner::{SystemRunner, ToolRunner, ToolStatus};
pub use toolchain::ToolchainPrefix;
