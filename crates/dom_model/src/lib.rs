//! DOM Model - HTML-like document tree
//!
//! This crate provides the document tree the change-tracking engine edits:
//! - An arena of element and text nodes with stable [`NodeId`]s
//! - Boundary points and ranges with extraction and character stepping
//! - The [`Selection`] interface and an in-memory implementation
//! - A markup reader/writer for loading content and inspecting results

mod error;
mod markup;
mod node;
mod node_id;
mod range;
mod selection;
pub mod text;
mod tree;

pub use error::*;
pub use markup::*;
pub use node::*;
pub use node_id::*;
pub use range::*;
pub use selection::*;
pub use tree::*;
