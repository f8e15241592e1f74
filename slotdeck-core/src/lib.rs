//! Slotdeck library exports
//!
//! Image catalog normalization, accelerator reconciliation and resource
//! preset validation for cluster administration consoles.

pub mod alias;
pub mod api;
pub mod config;
pub mod console;
pub mod error;
pub mod image;
pub mod preset;
pub mod registry;
pub mod resource;
pub mod task;
pub mod units;

pub use console::Console;
pub use error::{ConsoleError, ConsoleResult, ValidationError};
