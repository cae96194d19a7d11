//! The minimal "Delta-like table" contract: a JSON manifest listing the
//! current data files, the schema, and a monotonically increasing version.
//!
//! This is the smallest surface a full Delta Lake transaction-log reader
//! would also need to expose to this data plane — reading the actual Delta
//! log format is out of scope, so a dataset is published here as one
//! directory prefix holding immutable Parquet files plus this manifest.

use mktplace_common::error::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::schema::TableSchema;

pub const MANIFEST_FILE_NAME: &str = "_manifest.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u64,
    pub schema: TableSchema,
    /// Object keys of the current immutable data files, relative to the
    /// table's prefix.
    pub data_files: Vec<String>,
}

impl Manifest {
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the bytes are not valid manifest JSON.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::configuration(format!("malformed table manifest: {e}")))
    }

    #[must_use]
    pub fn to_json_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Manifest always serializes")
    }
}
