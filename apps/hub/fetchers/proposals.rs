use crate::{
    cache::{QueryCache, QuerySnapshot},
    config::Dao,
    degraded,
    endpoints::{ServiceKind, resolve_endpoints},
    executor::{self, FetchError, Fetched, RetryPolicy},
    graphql,
    models::proposals::{Proposal, ProposalDetails, ProposalDetailsData, ProposalsData},
    store::SettingsStore,
};
use reqwest::Client;
use std::{sync::Arc, time::Duration};
use tracing::instrument;

const LIST_STALE_AFTER: Duration = Duration::from_secs(30);
const DETAIL_STALE_AFTER: Duration = Duration::from_secs(60);

const KNOWN_STATUSES: [&str; 9] = [
    "PENDING",
    "ACTIVE",
    "CANCELED",
    "DEFEATED",
    "SUCCEEDED",
    "QUEUED",
    "EXPIRED",
    "EXECUTED",
    "VETOED",
];

const PROPOSAL_FIELDS: &str = "\
            id
            title
            description
            proposer
            targets
            values
            signatures
            calldatas
            startBlock
            endBlock
            forVotes
            againstVotes
            abstainVotes
            canceled
            vetoed
            executed
            createdTimestamp
            createdTransactionHash
            status
            quorumVotes
            totalSupply";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProposalFilter {
    pub status: Option<String>,
    pub proposer: Option<String>,
    pub search: Option<String>,
}

impl ProposalFilter {
    pub fn active() -> Self {
        Self {
            status: Some("ACTIVE".to_string()),
            ..Self::default()
        }
    }

    /// Status goes into the query's `where` clause when the indexer knows the
    /// value; anything else stays a client-side filter so primary and
    /// fallback behave identically.
    fn server_side_status(&self) -> Option<String> {
        self.status
            .as_deref()
            .filter(|s| !s.eq_ignore_ascii_case("all"))
            .map(|s| s.to_uppercase())
            .filter(|s| KNOWN_STATUSES.contains(&s.as_str()))
    }

    fn cache_fragment(&self) -> String {
        format!(
            "status={}:proposer={}:search={}",
            self.status.as_deref().unwrap_or(""),
            self.proposer.as_deref().unwrap_or(""),
            self.search.as_deref().unwrap_or("")
        )
    }
}

fn proposals_query(first: usize, skip: usize, status: Option<&str>) -> String {
    let where_clause = match status {
        Some(status) => format!(",\n                where: {{ status: \"{status}\" }}"),
        None => String::new(),
    };
    format!(
        r#"
        {{
            proposals(
                first: {first},
                skip: {skip},
                orderBy: createdTimestamp,
                orderDirection: desc{where_clause}
            ) {{
{PROPOSAL_FIELDS}
            }}
        }}"#
    )
}

fn proposal_details_query(proposal_id: &str) -> String {
    format!(
        r#"
        {{
            proposal(id: "{proposal_id}") {{
{PROPOSAL_FIELDS}
                votes(first: 100, orderBy: votes, orderDirection: desc) {{
                    id
                    voter
                    support
                    supportDetailed
                    votesRaw
                    votes
                    reason
                    blockNumber
                    blockTimestamp
                }}
            }}
        }}"#
    )
}

/// Free-text search is never assumed to be indexed; proposer matching is a
/// substring match the indexer cannot express. Both always run client-side.
fn apply_filters(
    proposals: Vec<Proposal>,
    filter: &ProposalFilter,
    status_applied_server_side: bool,
) -> Vec<Proposal> {
    proposals
        .into_iter()
        .filter(|proposal| {
            if !status_applied_server_side {
                if let Some(status) = filter.status.as_deref().filter(|s| !s.eq_ignore_ascii_case("all")) {
                    if !proposal.status.eq_ignore_ascii_case(status) {
                        return false;
                    }
                }
            }
            if let Some(proposer) = filter.proposer.as_deref().filter(|p| !p.is_empty()) {
                if !proposal
                    .proposer
                    .to_lowercase()
                    .contains(&proposer.to_lowercase())
                {
                    return false;
                }
            }
            if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                let term = search.to_lowercase();
                let matches = proposal
                    .title
                    .as_deref()
                    .is_some_and(|t| t.to_lowercase().contains(&term))
                    || proposal
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
                    || proposal.id.contains(&term);
                if !matches {
                    return false;
                }
            }
            true
        })
        .collect()
}

pub struct ProposalsFetcher {
    client: Client,
    store: Arc<SettingsStore>,
    list_policy: RetryPolicy,
    detail_policy: RetryPolicy,
    list_cache: QueryCache<Vec<Proposal>>,
    detail_cache: QueryCache<ProposalDetails>,
}

impl ProposalsFetcher {
    pub fn new(client: Client, store: Arc<SettingsStore>) -> Self {
        Self {
            client,
            store,
            list_policy: RetryPolicy::new(2),
            detail_policy: RetryPolicy::new(3).with_max_delay(Duration::from_secs(30)),
            list_cache: QueryCache::new("proposals", LIST_STALE_AFTER),
            detail_cache: QueryCache::new("proposal_details", DETAIL_STALE_AFTER),
        }
    }

    #[instrument(skip(self, filter), fields(dao = %dao, page = page))]
    pub async fn page(
        &self,
        dao: Dao,
        page: usize,
        first: usize,
        filter: &ProposalFilter,
    ) -> QuerySnapshot<Vec<Proposal>> {
        let candidates = resolve_endpoints(dao, ServiceKind::Indexer, &self.store.current());
        self.load_page(dao, page, first, filter, candidates, false)
            .await
    }

    #[instrument(skip(self, filter), fields(dao = %dao, page = page))]
    pub async fn refresh_page(
        &self,
        dao: Dao,
        page: usize,
        first: usize,
        filter: &ProposalFilter,
    ) -> QuerySnapshot<Vec<Proposal>> {
        let candidates = resolve_endpoints(dao, ServiceKind::Indexer, &self.store.current());
        self.load_page(dao, page, first, filter, candidates, true)
            .await
    }

    /// The countdown widget's feed: the three newest active proposals.
    pub async fn active(&self, dao: Dao) -> QuerySnapshot<Vec<Proposal>> {
        self.page(dao, 1, 3, &ProposalFilter::active()).await
    }

    #[instrument(skip(self), fields(dao = %dao, proposal_id = proposal_id))]
    pub async fn details(&self, dao: Dao, proposal_id: &str) -> QuerySnapshot<ProposalDetails> {
        let candidates = resolve_endpoints(dao, ServiceKind::Indexer, &self.store.current());
        self.load_details(dao, proposal_id, candidates, false).await
    }

    async fn load_page(
        &self,
        dao: Dao,
        page: usize,
        first: usize,
        filter: &ProposalFilter,
        candidates: Vec<String>,
        force: bool,
    ) -> QuerySnapshot<Vec<Proposal>> {
        let skip = page.saturating_sub(1) * first;
        let key = format!(
            "{}:proposals:page={}:first={}:{}",
            dao.slug(),
            page,
            first,
            filter.cache_fragment()
        );

        let server_side_status = filter.server_side_status();
        let status_applied_server_side = server_side_status.is_some();
        let query = Arc::new(proposals_query(first, skip, server_side_status.as_deref()));
        let client = self.client.clone();
        let policy = self.list_policy.clone();
        let filter = filter.clone();

        let loader = move || async move {
            let fetched = executor::execute_or_degraded(
                "proposals",
                &candidates,
                &policy,
                move |url| {
                    let client = client.clone();
                    let query = query.clone();
                    async move {
                        graphql::post_query::<ProposalsData>(&client, &url, &query)
                            .await
                            .map(|data| data.proposals)
                    }
                },
                move || degraded::mock_proposals(first),
            )
            .await?;

            // Degraded pages skip descriptor filters: a placeholder surface
            // beats an empty one.
            Ok(if fetched.degraded {
                fetched
            } else {
                fetched.map(|proposals| apply_filters(proposals, &filter, status_applied_server_side))
            })
        };

        if force {
            self.list_cache.refresh(&key, loader).await
        } else {
            self.list_cache.fetch(&key, loader).await
        }
    }

    async fn load_details(
        &self,
        dao: Dao,
        proposal_id: &str,
        candidates: Vec<String>,
        force: bool,
    ) -> QuerySnapshot<ProposalDetails> {
        let key = format!("{}:proposal:{}", dao.slug(), proposal_id);
        let query = Arc::new(proposal_details_query(proposal_id));
        let client = self.client.clone();
        let policy = self.detail_policy.clone();
        let proposal_id = proposal_id.to_string();

        let loader = move || async move {
            executor::execute("proposal_details", &candidates, &policy, move |url| {
                let client = client.clone();
                let query = query.clone();
                let proposal_id = proposal_id.clone();
                async move {
                    let data =
                        graphql::post_query::<ProposalDetailsData>(&client, &url, &query).await?;
                    data.proposal
                        .ok_or_else(|| FetchError::not_found("proposal", proposal_id))
                }
            })
            .await
            .map(Fetched::live)
        };

        if force {
            self.detail_cache.refresh(&key, loader).await
        } else {
            self.detail_cache.fetch(&key, loader).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AppSettings;
    use mockito::{Matcher, Server};
    use std::path::PathBuf;

    fn test_store(name: &str) -> Arc<SettingsStore> {
        let path = std::env::temp_dir().join(format!(
            "nouniverse-proposals-{}-{}.json",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Arc::new(SettingsStore::load_from(PathBuf::from(path)))
    }

    fn fast_fetcher(store: Arc<SettingsStore>) -> ProposalsFetcher {
        let mut fetcher = ProposalsFetcher::new(Client::new(), store);
        fetcher.list_policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        fetcher.detail_policy = fetcher.list_policy.clone();
        fetcher
    }

    fn proposal_json(id: usize) -> serde_json::Value {
        serde_json::json!({
            "id": id.to_string(),
            "title": format!("Proposal {id}"),
            "description": "A proposal",
            "proposer": "0x6f3e6272a167e8accb32072d08e0957f9c79223d",
            "targets": [],
            "values": [],
            "signatures": [],
            "calldatas": [],
            "startBlock": "18500000",
            "endBlock": "18532000",
            "forVotes": "1",
            "againstVotes": "0",
            "abstainVotes": "0",
            "canceled": false,
            "vetoed": false,
            "executed": false,
            "createdTimestamp": "1700000000",
            "createdTransactionHash": "0xabc",
            "status": if id % 2 == 0 { "ACTIVE" } else { "EXECUTED" },
            "quorumVotes": "1",
            "totalSupply": "100"
        })
    }

    fn proposals_body(count: usize) -> String {
        let proposals: Vec<_> = (1..=count).map(proposal_json).collect();
        serde_json::json!({ "data": { "proposals": proposals } }).to_string()
    }

    #[tokio::test]
    async fn fallback_serves_the_page_when_primary_errors() {
        let mut primary = Server::new_async().await;
        let mut fallback = Server::new_async().await;

        let primary_mock = primary
            .mock("POST", "/")
            .with_status(500)
            .expect_at_least(1)
            .create_async()
            .await;
        let fallback_mock = fallback
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(proposals_body(12))
            .create_async()
            .await;

        let fetcher = fast_fetcher(test_store("fallback"));
        let snapshot = fetcher
            .load_page(
                Dao::Nouns,
                1,
                12,
                &ProposalFilter::default(),
                vec![primary.url(), fallback.url()],
                false,
            )
            .await;

        let proposals = snapshot.data.unwrap();
        assert_eq!(proposals.len(), 12);
        assert!(!snapshot.degraded);
        primary_mock.assert_async().await;
        fallback_mock.assert_async().await;
    }

    #[tokio::test]
    async fn exhausted_endpoints_degrade_to_synthetic_proposals() {
        let mut primary = Server::new_async().await;
        let mut fallback = Server::new_async().await;
        primary.mock("POST", "/").with_status(500).expect_at_least(1).create_async().await;
        fallback.mock("POST", "/").with_status(503).expect_at_least(1).create_async().await;

        let fetcher = fast_fetcher(test_store("degraded"));
        let snapshot = fetcher
            .load_page(
                Dao::Nouns,
                1,
                12,
                &ProposalFilter::default(),
                vec![primary.url(), fallback.url()],
                false,
            )
            .await;

        assert!(snapshot.degraded);
        assert_eq!(snapshot.data.unwrap().len(), 12);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn missing_proposal_is_a_not_found_error_not_synthetic_data() {
        let mut primary = Server::new_async().await;
        let primary_mock = primary
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": {"proposal": null}}"#)
            .expect(1)
            .create_async()
            .await;

        let mut fallback = Server::new_async().await;
        let fallback_mock = fallback
            .mock("POST", "/")
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let fetcher = fast_fetcher(test_store("notfound"));
        let snapshot = fetcher
            .load_details(
                Dao::Nouns,
                "999999",
                vec![primary.url(), fallback.url()],
                false,
            )
            .await;

        assert!(snapshot.data.is_none());
        let error = snapshot.error.unwrap();
        assert!(error.is_not_found());
        assert!(error.to_string().contains("999999"));
        primary_mock.assert_async().await;
        fallback_mock.assert_async().await;
    }

    #[tokio::test]
    async fn known_status_filters_are_pushed_into_the_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#"where: \{ status: \\"ACTIVE\\" \}"#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(proposals_body(2))
            .create_async()
            .await;

        let fetcher = fast_fetcher(test_store("serverside"));
        let snapshot = fetcher
            .load_page(
                Dao::Nouns,
                1,
                3,
                &ProposalFilter::active(),
                vec![server.url()],
                false,
            )
            .await;

        assert!(snapshot.data.is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn proposer_and_search_filters_run_client_side() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(proposals_body(10))
            .create_async()
            .await;

        let filter = ProposalFilter {
            status: None,
            proposer: Some("0x6F3E".to_string()),
            search: Some("proposal 3".to_string()),
        };
        let fetcher = fast_fetcher(test_store("clientside"));
        let snapshot = fetcher
            .load_page(Dao::Nouns, 1, 10, &filter, vec![server.url()], false)
            .await;

        let proposals = snapshot.data.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].id, "3");
    }

    #[test]
    fn unknown_status_values_stay_client_side() {
        let filter = ProposalFilter {
            status: Some("IMAGINARY".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.server_side_status(), None);

        let all = ProposalFilter {
            status: Some("all".to_string()),
            ..Default::default()
        };
        assert_eq!(all.server_side_status(), None);

        assert_eq!(
            ProposalFilter::active().server_side_status().as_deref(),
            Some("ACTIVE")
        );
    }

    #[test]
    fn default_settings_resolve_public_graph_endpoints() {
        let settings = AppSettings::default();
        let candidates = resolve_endpoints(Dao::Nouns, ServiceKind::Indexer, &settings);
        assert!(candidates.iter().all(|url| url.starts_with("https://")));
    }
}
