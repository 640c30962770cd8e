//! Utility modules shared by the worker components.

pub mod date;
pub mod fs;
pub mod html;
pub mod link;
pub mod mtime;
