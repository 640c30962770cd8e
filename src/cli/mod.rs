//! Command-line interface module.

mod args;
pub mod common;
pub mod gather;
pub mod listen;
pub mod publish;
pub mod replay;

pub use args::{Cli, Commands};
