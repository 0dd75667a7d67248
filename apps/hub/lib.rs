use crate::{
    chain::ChainService,
    fetchers::{auctions::AuctionsFetcher, delegates::DelegatesFetcher, proposals::ProposalsFetcher},
    ipfs::IpfsService,
    store::SettingsStore,
};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use std::{sync::Arc, time::Duration};

pub mod api;
pub mod cache;
pub mod chain;
pub mod config;
pub mod degraded;
pub mod endpoints;
pub mod executor;
pub mod fetchers;
pub mod graphql;
pub mod ipfs;
pub mod models;
pub mod store;
pub mod widgets;

pub const APP_USER_AGENT: &str =
    "Nouniverse Hub/1.0 (https://nouniverse.app; contact@nouniverse.app) reqwest/0.12";

// A hung endpoint must not starve the fallback indefinitely.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(APP_USER_AGENT));
    headers
}

/// Everything the API surface and the refresh loops share: one settings
/// store, one HTTP client, one cache per query kind.
pub struct AppContext {
    pub store: Arc<SettingsStore>,
    pub proposals: ProposalsFetcher,
    pub delegates: DelegatesFetcher,
    pub auctions: AuctionsFetcher,
    pub chain: ChainService,
    pub ipfs: IpfsService,
}

impl AppContext {
    pub fn new(store: Arc<SettingsStore>) -> Self {
        let client = Client::builder()
            .default_headers(default_headers())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            proposals: ProposalsFetcher::new(client.clone(), store.clone()),
            delegates: DelegatesFetcher::new(client.clone(), store.clone()),
            auctions: AuctionsFetcher::new(client.clone(), store.clone()),
            chain: ChainService::new(client, store.clone()),
            ipfs: IpfsService::from_env(),
            store,
        }
    }
}
