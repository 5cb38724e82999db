//! # CLI UI Module
//!
//! Styling and formatting for laodong CLI output.
//!
//! ## Design Principles
//!
//! 1. **Streamed**: answer tokens are printed as they arrive
//! 2. **Accessible**: works without colors (respects `NO_COLOR`)
//! 3. **Scriptable**: `--json` output is machine-parseable and free of spinners
//!
//! ## Module Structure
//!
//! - `color`: color mode detection and terminal checks
//! - `style`: message prefixes and styling
//! - `format`: text, time and latency formatters
//! - `table`: citation, health and history tables
//! - `progress`: spinner while waiting for the first token

pub mod color;
pub mod format;
pub mod progress;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use progress::{Progress, ProgressMode};
pub use style::{MessageType, Style};
