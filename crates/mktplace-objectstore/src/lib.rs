//! Object storage client and garbage collection for materialized tables.

pub mod client;
pub mod sweep;

pub use client::{ObjectEntry, ObjectStoreClient};
pub use sweep::sweep_watermarked_older_than_one_hour;
