//! Track Changes over an HTML-like document tree
//!
//! This crate records edits by several authors as annotations in the
//! document itself:
//! - Insertions are wrapped in insertion annotations, deletions are kept
//!   in place inside deletion annotations
//! - Annotations carry group id, author, time and payload as attributes,
//!   so the registry can be rebuilt from content at any time
//! - Pending changes can be accepted or rejected globally, by filter or
//!   one group at a time
//! - [`TrackingSession`] ties a document, its registry and a selection
//!   backend together for a host editor

mod bookmark;
mod change;
mod classifier;
mod config;
mod content;
mod error;
mod filter;
mod host;
mod mutator;
mod notify;
mod registry;
mod review;
mod session;
mod styles;

pub use bookmark::*;
pub use change::*;
pub use classifier::*;
pub use config::*;
pub use content::*;
pub use error::*;
pub use filter::*;
pub use host::*;
pub use mutator::*;
pub use notify::*;
pub use registry::*;
pub use review::*;
pub use session::*;
pub use styles::*;
