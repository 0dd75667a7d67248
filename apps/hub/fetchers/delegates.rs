use crate::{
    cache::{QueryCache, QuerySnapshot},
    config::Dao,
    degraded,
    endpoints::{ServiceKind, resolve_endpoints},
    executor::{self, RetryPolicy},
    graphql,
    models::delegates::{Delegate, DelegatesData},
    store::SettingsStore,
};
use reqwest::Client;
use std::{sync::Arc, time::Duration};
use tracing::instrument;

const STALE_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelegateOrder {
    #[default]
    DelegatedVotes,
    TokenHoldersRepresented,
}

impl DelegateOrder {
    fn field(&self) -> &'static str {
        match self {
            DelegateOrder::DelegatedVotes => "delegatedVotesRaw",
            DelegateOrder::TokenHoldersRepresented => "tokenHoldersRepresentedAmount",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    Asc,
    #[default]
    Desc,
}

impl OrderDirection {
    fn keyword(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

fn delegates_query(
    first: usize,
    skip: usize,
    order: DelegateOrder,
    direction: OrderDirection,
) -> String {
    format!(
        r#"
        {{
            delegates(
                first: {first},
                skip: {skip},
                orderBy: {order_field},
                orderDirection: {direction},
                where: {{ delegatedVotesRaw_gt: "0" }}
            ) {{
                id
                delegatedVotes
                delegatedVotesRaw
                tokenHoldersRepresentedAmount
                nounsRepresented(first: 5) {{
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
                votes(first: 5, orderBy: blockNumber, orderDirection: desc) {{
                    id
                    support
                    votes
                    proposal {{
                        id
                        title
                    }}
                    blockTimestamp
                }}
                proposals(first: 3, orderBy: createdTimestamp, orderDirection: desc) {{
                    id
                    title
                    status
                    createdTimestamp
                }}
            }}
        }}"#,
        order_field = order.field(),
        direction = direction.keyword(),
    )
}

pub struct DelegatesFetcher {
    client: Client,
    store: Arc<SettingsStore>,
    policy: RetryPolicy,
    cache: QueryCache<Vec<Delegate>>,
}

impl DelegatesFetcher {
    pub fn new(client: Client, store: Arc<SettingsStore>) -> Self {
        Self {
            client,
            store,
            policy: RetryPolicy::new(2),
            cache: QueryCache::new("delegates", STALE_AFTER),
        }
    }

    #[instrument(skip(self), fields(dao = %dao, page = page))]
    pub async fn page(
        &self,
        dao: Dao,
        page: usize,
        first: usize,
        order: DelegateOrder,
        direction: OrderDirection,
    ) -> QuerySnapshot<Vec<Delegate>> {
        let candidates = resolve_endpoints(dao, ServiceKind::Indexer, &self.store.current());
        self.load_page(dao, page, first, order, direction, candidates, false)
            .await
    }

    #[instrument(skip(self), fields(dao = %dao, page = page))]
    pub async fn refresh_page(
        &self,
        dao: Dao,
        page: usize,
        first: usize,
        order: DelegateOrder,
        direction: OrderDirection,
    ) -> QuerySnapshot<Vec<Delegate>> {
        let candidates = resolve_endpoints(dao, ServiceKind::Indexer, &self.store.current());
        self.load_page(dao, page, first, order, direction, candidates, true)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn load_page(
        &self,
        dao: Dao,
        page: usize,
        first: usize,
        order: DelegateOrder,
        direction: OrderDirection,
        candidates: Vec<String>,
        force: bool,
    ) -> QuerySnapshot<Vec<Delegate>> {
        let skip = page.saturating_sub(1) * first;
        let key = format!(
            "{}:delegates:page={}:first={}:order={}:{}",
            dao.slug(),
            page,
            first,
            order.field(),
            direction.keyword()
        );

        let query = Arc::new(delegates_query(first, skip, order, direction));
        let client = self.client.clone();
        let policy = self.policy.clone();

        let loader = move || async move {
            executor::execute_or_degraded(
                "delegates",
                &candidates,
                &policy,
                move |url| {
                    let client = client.clone();
                    let query = query.clone();
                    async move {
                        graphql::post_query::<DelegatesData>(&client, &url, &query)
                            .await
                            .map(|data| data.delegates)
                    }
                },
                move || degraded::mock_delegates(first),
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
