//! Virtual directory schema.
//!
//! A [`VirtualDirectory`] is the permitted file layout of a project, parsed
//! once per request from a box-drawing tree listing and queried read-only
//! afterwards.

mod parser;
pub mod paths;
mod tree;

pub use parser::parse_tree;
pub use paths::{has_extension, normalize_path, resolve_relative};
pub use tree::{VirtualDirectory, VirtualDirectoryNode};
