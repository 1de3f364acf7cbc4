//! Generic utility primitives with zero domain knowledge.
//!
//! - `io` - File and spec input with consistent error handling
//! - `shell` - Shell escaping and quoting
//! - `template` - String template rendering

pub mod io;
pub mod shell;
pub(crate) mod template;
