//! Shared state for the sharing router: the one database pool, the one
//! object-store HTTP client, and the immutable configuration record, all
//! owned once and handed to every handler by reference (§5's "one
//! connection pool per process" resource policy).

use mktplace_catalog::Catalog;
use mktplace_common::Config;
use mktplace_objectstore::ObjectStoreClient;

pub struct SharingState {
    pub catalog: Catalog,
    pub store: ObjectStoreClient,
    pub config: Config,
}

impl SharingState {
    #[must_use]
    pub fn new(catalog: Catalog, config: Config) -> Self {
        let store = ObjectStoreClient::new(config.object_store.clone(), config.tuning.object_store_max_retries);
        Self { catalog, store, config }
    }

    /// The seller id this process is pinned to, if `SELLER_ID` parses as a
    /// catalog user id. A non-numeric or unset value means this process
    /// serves shares for any seller (e.g. local development).
    #[must_use]
    pub fn seller_pin(&self) -> Option<i64> {
        self.config.seller.seller_id.parse().ok()
    }
}
