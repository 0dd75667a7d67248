use anyhow::Result;
use dotenv::dotenv;
use hub::{
    AppContext, api,
    config::{AUCTIONS_PER_PAGE, DELEGATES_PER_PAGE, PROPOSALS_PER_PAGE},
    fetchers::{
        delegates::{DelegateOrder, OrderDirection},
        proposals::ProposalFilter,
    },
    store::SettingsStore,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use utils::tracing::setup_tracing;

static PROPOSALS_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
static AUCTIONS_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
static DELEGATES_REFRESH_INTERVAL: Duration = Duration::from_secs(300);
static BLOCK_REFRESH_INTERVAL: Duration = Duration::from_secs(12);

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    setup_tracing();

    info!("Nouniverse hub starting up");
    let store = Arc::new(SettingsStore::load());
    let ctx = Arc::new(AppContext::new(store));

    let app = api::router(ctx.clone());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    let addr = listener.local_addr()?;

    let mut handles = Vec::new();

    handles.push(tokio::spawn(async move {
        info!(address = %addr, "Starting API server");
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server error");
        }
    }));

    // Keep the first page of proposals for the selected DAO warm.
    let proposals_ctx = ctx.clone();
    handles.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(PROPOSALS_REFRESH_INTERVAL);
        loop {
            interval.tick().await;
            let dao = proposals_ctx.store.selected_dao();
            let snapshot = proposals_ctx
                .proposals
                .refresh_page(dao, 1, PROPOSALS_PER_PAGE, &ProposalFilter::default())
                .await;
            match &snapshot.error {
                None => info!(
                    dao = %dao,
                    count = snapshot.data.as_ref().map(Vec::len).unwrap_or(0),
                    degraded = snapshot.degraded,
                    "Refreshed proposals"
                ),
                Some(e) => error!(dao = %dao, error = %e, "Error refreshing proposals"),
            }
        }
    }));

    let auctions_ctx = ctx.clone();
    handles.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(AUCTIONS_REFRESH_INTERVAL);
        loop {
            interval.tick().await;
            let dao = auctions_ctx.store.selected_dao();
            let snapshot = auctions_ctx
                .auctions
                .refresh_page(dao, 1, AUCTIONS_PER_PAGE, None)
                .await;
            match &snapshot.error {
                None => info!(
                    dao = %dao,
                    count = snapshot.data.as_ref().map(Vec::len).unwrap_or(0),
                    degraded = snapshot.degraded,
                    "Refreshed auctions"
                ),
                Some(e) => error!(dao = %dao, error = %e, "Error refreshing auctions"),
            }
        }
    }));

    let delegates_ctx = ctx.clone();
    handles.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(DELEGATES_REFRESH_INTERVAL);
        loop {
            interval.tick().await;
            let dao = delegates_ctx.store.selected_dao();
            let snapshot = delegates_ctx
                .delegates
                .refresh_page(
                    dao,
                    1,
                    DELEGATES_PER_PAGE,
                    DelegateOrder::default(),
                    OrderDirection::default(),
                )
                .await;
            match &snapshot.error {
                None => info!(
                    dao = %dao,
                    count = snapshot.data.as_ref().map(Vec::len).unwrap_or(0),
                    degraded = snapshot.degraded,
                    "Refreshed delegates"
                ),
                Some(e) => error!(dao = %dao, error = %e, "Error refreshing delegates"),
            }
        }
    }));

    let block_ctx = ctx.clone();
    handles.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(BLOCK_REFRESH_INTERVAL);
        loop {
            interval.tick().await;
            let snapshot = block_ctx.chain.refresh_current_block().await;
            match &snapshot.error {
                None => info!(block = snapshot.data.unwrap_or(0), "Refreshed current block"),
                Some(e) => error!(error = %e, "Error refreshing current block"),
            }
        }
    }));

    futures::future::join_all(handles).await;

    Ok(())
}
