use crate::{
    cache::{QueryCache, QuerySnapshot},
    config::Dao,
    degraded,
    endpoints::{ServiceKind, resolve_endpoints},
    executor::{self, RetryPolicy},
    graphql,
    models::auctions::{Auction, AuctionsData},
    store::SettingsStore,
};
use reqwest::Client;
use std::{sync::Arc, time::Duration};
use tracing::instrument;

const STALE_AFTER: Duration = Duration::from_secs(30);

fn auctions_query(first: usize, skip: usize, settled: Option<bool>) -> String {
    let where_clause = match settled {
        Some(settled) => format!(",\n                where: {{ settled: {settled} }}"),
        None => String::new(),
    };
    format!(
        r#"
        {{
            auctions(
                first: {first},
                skip: {skip},
                orderBy: startTime,
                orderDirection: desc{where_clause}
            ) {{
                id
                amount
                startTime
                endTime
                bidder
                settled
                noun {{
                    id
                    owner
                    seed {{
                        background
                        body
                        accessory
                        head
                        glasses
                    }}
                }}
                bids(first: 10, orderBy: amount, orderDirection: desc) {{
                    id
                    amount
                    bidder
                    blockNumber
                    blockTimestamp
                    txnHash
                }}
            }}
        }}"#
    )
}

pub struct AuctionsFetcher {
    client: Client,
    store: Arc<SettingsStore>,
    policy: RetryPolicy,
    cache: QueryCache<Vec<Auction>>,
}

impl AuctionsFetcher {
    pub fn new(client: Client, store: Arc<SettingsStore>) -> Self {
        Self {
            client,
            store,
            policy: RetryPolicy::new(2),
            cache: QueryCache::new("auctions", STALE_AFTER),
        }
    }

    #[instrument(skip(self), fields(dao = %dao, page = page))]
    pub async fn page(
        &self,
        dao: Dao,
        page: usize,
        first: usize,
        settled: Option<bool>,
    ) -> QuerySnapshot<Vec<Auction>> {
        let candidates = resolve_endpoints(dao, ServiceKind::Indexer, &self.store.current());
        self.load_page(dao, page, first, settled, candidates, false)
            .await
    }

    #[instrument(skip(self), fields(dao = %dao, page = page))]
    pub async fn refresh_page(
        &self,
        dao: Dao,
        page: usize,
        first: usize,
        settled: Option<bool>,
    ) -> QuerySnapshot<Vec<Auction>> {
        let candidates = resolve_endpoints(dao, ServiceKind::Indexer, &self.store.current());
        self.load_page(dao, page, first, settled, candidates, true)
            .await
    }

    /// The live auction, if one is running.
    pub async fn current(&self, dao: Dao) -> QuerySnapshot<Option<Auction>> {
        let snapshot = self.page(dao, 1, 1, Some(false)).await;
        QuerySnapshot {
            data: snapshot.data.map(|auctions| auctions.into_iter().next()),
            is_loading: snapshot.is_loading,
            is_stale: snapshot.is_stale,
            degraded: snapshot.degraded,
            error: snapshot.error,
            fetched_at: snapshot.fetched_at,
        }
    }

    async fn load_page(
        &self,
        dao: Dao,
        page: usize,
        first: usize,
        settled: Option<bool>,
        candidates: Vec<String>,
        force: bool,
    ) -> QuerySnapshot<Vec<Auction>> {
        let skip = page.saturating_sub(1) * first;
        let key = format!(
            "{}:auctions:page={}:first={}:settled={}",
            dao.slug(),
            page,
            first,
            settled.map(|s| s.to_string()).unwrap_or_default()
        );

        let query = Arc::new(auctions_query(first, skip, settled));
        let client = self.client.clone();
        let policy = self.policy.clone();

        let loader = move || async move {
            executor::execute_or_degraded(
                "auctions",
                &candidates,
                &policy,
                move |url| {
                    let client = client.clone();
                    let query = query.clone();
                    async move {
                        graphql::post_query::<AuctionsData>(&client, &url, &query)
                            .await
                            .map(|data| data.auctions)
                    }
                },
                move || degraded::mock_auctions(first, settled),
            )
            .await
        };

        if force {
            self.cache.refresh(&key, loader).await
        } else {
            self.cache.fetch(&key, loader).await
        }
    }
}
