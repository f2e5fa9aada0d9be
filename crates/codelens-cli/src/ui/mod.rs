//! # CLI UI Module
//!
//! Styling and formatting layer for CodeLens CLI output.
//!
//! - `color`: Color mode detection (`NO_COLOR`, TTY)
//! - `style`: Message prefixes, sections, key/value lines
//! - `table`: Table rendering with comfy-table
//!
//! Everything printed here goes to stdout. Logs go to stderr, and `--json`
//! output bypasses this module entirely.

pub mod color;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use style::{MessageType, Style};
