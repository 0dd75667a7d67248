use crate::{
    config::{self, Dao},
    store::AppSettings,
};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Indexer,
    ChainRpc,
}

/// Ordered candidate URLs for one (DAO, service) pair. A hardcoded fallback
/// always exists, so the result is never empty. User overrides come first;
/// the chain RPC override replaces the primary rather than extending the
/// list, mirroring the settings surface.
pub fn resolve_endpoints(dao: Dao, kind: ServiceKind, settings: &AppSettings) -> Vec<String> {
    let mut candidates = Vec::new();

    match kind {
        ServiceKind::Indexer => {
            if let Some(url) = settings.indexer_override(dao) {
                candidates.push(url.to_string());
            }
            candidates.push(config::graph_endpoint(dao));
            candidates.push(config::dao_config(dao).graph_fallback_url.to_string());
        }
        ServiceKind::ChainRpc => {
            match settings.rpc_override.as_deref().filter(|u| !u.is_empty()) {
                Some(url) => candidates.push(url.to_string()),
                None => candidates.push(config::rpc_primary()),
            }
            candidates.push(config::rpc_backup());
            candidates.push(config::RPC_PUBLIC_URL.to_string());
        }
    }

    dedup_preserving_order(candidates)
}

fn dedup_preserving_order(candidates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
