//! Storage primitives
//!
//! One entity per JSON file, one directory per store. No database.

mod json;

pub use json::JsonDir;
