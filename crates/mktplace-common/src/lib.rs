//! Shared types for the deltaS marketplace.
//!
//! This crate holds the pieces every other crate in the workspace needs:
//! the single immutable [`config::Config`] record, the common [`error::Error`]
//! taxonomy, and the tagged [`value::AnchorValue`] abstraction used by the
//! row-anchor and predicate machinery.

pub mod config;
pub mod error;
pub mod value;

pub use config::Config;
pub use error::{Error, Result};
pub use value::AnchorValue;
