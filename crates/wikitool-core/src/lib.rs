//! Core types for wikitool: the title/filepath codec, the wikitext parser,
//! the project filesystem view, and the shared error and record types.

// Imported first to make the macro available to the other modules.
#[macro_use]
mod lazy_regex;

// The rest of these sub-modules are in alphabetical order.
mod error;
pub mod fs;
pub mod hash;
pub mod settings;
pub mod site;
pub mod types;
pub mod wikitext;

pub use error::{Error, Result};
