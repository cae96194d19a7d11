//! Shared state for the marketplace router: one catalog handle, one JWT
//! issuer, and the immutable configuration record — the same "one pool,
//! held once" resource policy the data plane's `SharingState` follows.

use mktplace_auth::jwt::JwtIssuer;
use mktplace_catalog::Catalog;
use mktplace_common::Config;

pub struct MarketplaceState {
    pub catalog: Catalog,
    pub jwt: JwtIssuer,
    pub config: Config,
}

impl MarketplaceState {
    #[must_use]
    pub fn new(catalog: Catalog, config: Config) -> Self {
        let jwt = JwtIssuer::new(
            config.secrets.jwt_secret_key.clone(),
            &config.secrets.jwt_algorithm,
            config.secrets.jwt_access_token_expire_minutes,
        );
        Self { catalog, jwt, config }
    }
}
