//! The "Delta-like table" this data plane reads from and writes to: a
//! directory prefix on object storage holding immutable Parquet data files
//! plus a `_manifest.json` describing them. See [`manifest`] for why this
//! is the minimal contract rather than a full Delta Lake log reader.

pub mod manifest;
pub mod reader;
pub mod schema;
pub mod writer;

pub use manifest::{Manifest, MANIFEST_FILE_NAME};
pub use schema::{Column, ColumnType, TableSchema};
