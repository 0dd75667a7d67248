use crate::{
    AppContext,
    cache::QuerySnapshot,
    config::{AUCTIONS_PER_PAGE, DELEGATES_PER_PAGE, Dao, PROPOSALS_PER_PAGE},
    fetchers::{
        delegates::{DelegateOrder, OrderDirection},
        proposals::ProposalFilter,
    },
    models::{auctions::Auction, delegates::Delegate, proposals::{Proposal, ProposalDetails}},
    store::AppSettings,
    widgets,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAX_PAGE_SIZE: usize = 100;

type ApiError = (StatusCode, String);

/// The `{data, isLoading, error}` triple consuming views read, plus the
/// staleness bookkeeping the cache tracks anyway.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub is_loading: bool,
    pub is_stale: bool,
    pub degraded: bool,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> From<QuerySnapshot<T>> for ApiResponse<T> {
    fn from(snapshot: QuerySnapshot<T>) -> Self {
        Self {
            data: snapshot.data,
            error: snapshot.error.map(|e| e.to_string()),
            is_loading: snapshot.is_loading,
            is_stale: snapshot.is_stale,
            degraded: snapshot.degraded,
            fetched_at: snapshot.fetched_at,
        }
    }
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/proposals", get(list_proposals))
        .route("/api/proposals/{id}", get(proposal_details))
        .route("/api/delegates", get(list_delegates))
        .route("/api/auctions", get(list_auctions))
        .route("/api/block", get(current_block))
        .route("/api/block/{number}", get(block_timestamp))
        .route("/api/widgets", get(widget_panel))
        .route("/api/ipfs", post(pin_json))
        .route("/api/ipfs/{hash}", get(fetch_pinned))
        .route("/api/settings", get(get_settings))
        .route("/api/settings/dao/{dao}", post(select_dao))
        .route(
            "/api/settings/favorites/proposals/{id}",
            post(toggle_favorite_proposal),
        )
        .route(
            "/api/settings/favorites/delegates/{id}",
            post(toggle_favorite_delegate),
        )
        .route(
            "/api/settings/widgets/{kind}",
            post(add_widget).delete(remove_widget),
        )
        .with_state(ctx)
}

fn bad_request(message: impl ToString) -> ApiError {
    (StatusCode::BAD_REQUEST, message.to_string())
}

fn resolve_dao(ctx: &AppContext, dao: &Option<String>) -> Result<Dao, ApiError> {
    match dao {
        Some(value) => value.parse().map_err(bad_request),
        None => Ok(ctx.store.selected_dao()),
    }
}

#[derive(Debug, Deserialize)]
struct DaoParam {
    dao: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProposalListParams {
    page: Option<usize>,
    first: Option<usize>,
    status: Option<String>,
    proposer: Option<String>,
    search: Option<String>,
    dao: Option<String>,
}

async fn list_proposals(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<ProposalListParams>,
) -> Result<Json<ApiResponse<Vec<Proposal>>>, ApiError> {
    let dao = resolve_dao(&ctx, &params.dao)?;
    let filter = ProposalFilter {
        status: params.status,
        proposer: params.proposer,
        search: params.search,
    };
    let snapshot = ctx
        .proposals
        .page(
            dao,
            params.page.unwrap_or(1).max(1),
            params.first.unwrap_or(PROPOSALS_PER_PAGE).clamp(1, MAX_PAGE_SIZE),
            &filter,
        )
        .await;
    Ok(Json(snapshot.into()))
}

async fn proposal_details(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Query(params): Query<DaoParam>,
) -> Result<Json<ApiResponse<ProposalDetails>>, ApiError> {
    let dao = resolve_dao(&ctx, &params.dao)?;
    let snapshot = ctx.proposals.details(dao, &id).await;

    if let Some(error) = snapshot.error.as_deref() {
        if error.is_not_found() {
            return Err((StatusCode::NOT_FOUND, error.to_string()));
        }
    }
    Ok(Json(snapshot.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DelegateListParams {
    page: Option<usize>,
    first: Option<usize>,
    order_by: Option<String>,
    order_direction: Option<String>,
    dao: Option<String>,
}

fn parse_order(value: &Option<String>) -> Result<DelegateOrder, ApiError> {
    match value.as_deref() {
        None | Some("delegatedVotesRaw") => Ok(DelegateOrder::DelegatedVotes),
        Some("tokenHoldersRepresentedAmount") => Ok(DelegateOrder::TokenHoldersRepresented),
        Some(other) => Err(bad_request(format!("Unknown order field: {other}"))),
    }
}

fn parse_direction(value: &Option<String>) -> Result<OrderDirection, ApiError> {
    match value.as_deref() {
        None | Some("desc") => Ok(OrderDirection::Desc),
        Some("asc") => Ok(OrderDirection::Asc),
        Some(other) => Err(bad_request(format!("Unknown order direction: {other}"))),
    }
}

async fn list_delegates(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<DelegateListParams>,
) -> Result<Json<ApiResponse<Vec<Delegate>>>, ApiError> {
    let dao = resolve_dao(&ctx, &params.dao)?;
    let snapshot = ctx
        .delegates
        .page(
            dao,
            params.page.unwrap_or(1).max(1),
            params.first.unwrap_or(DELEGATES_PER_PAGE).clamp(1, MAX_PAGE_SIZE),
            parse_order(&params.order_by)?,
            parse_direction(&params.order_direction)?,
        )
        .await;
    Ok(Json(snapshot.into()))
}

#[derive(Debug, Deserialize)]
struct AuctionListParams {
    page: Option<usize>,
    first: Option<usize>,
    settled: Option<bool>,
    dao: Option<String>,
}

async fn list_auctions(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<AuctionListParams>,
) -> Result<Json<ApiResponse<Vec<Auction>>>, ApiError> {
    let dao = resolve_dao(&ctx, &params.dao)?;
    let snapshot = ctx
        .auctions
        .page(
            dao,
            params.page.unwrap_or(1).max(1),
            params.first.unwrap_or(AUCTIONS_PER_PAGE).clamp(1, MAX_PAGE_SIZE),
            params.settled,
        )
        .await;
    Ok(Json(snapshot.into()))
}

async fn current_block(State(ctx): State<Arc<AppContext>>) -> Json<ApiResponse<u64>> {
    Json(ctx.chain.current_block().await.into())
}

#[derive(Debug, Serialize)]
struct BlockHeader {
    number: u64,
    timestamp: u64,
}

async fn block_timestamp(
    State(ctx): State<Arc<AppContext>>,
    Path(number): Path<u64>,
) -> Result<Json<BlockHeader>, ApiError> {
    let timestamp = ctx
        .chain
        .block_timestamp(number)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(Json(BlockHeader { number, timestamp }))
}

async fn pin_json(
    State(ctx): State<Arc<AppContext>>,
    Json(value): Json<serde_json::Value>,
) -> Result<Json<crate::ipfs::IpfsUpload>, ApiError> {
    let upload = ctx
        .ipfs
        .upload_json(&value)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(Json(upload))
}

async fn fetch_pinned(
    State(ctx): State<Arc<AppContext>>,
    Path(hash): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let value = ctx
        .ipfs
        .fetch_json(&hash)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(Json(value))
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct WidgetPanel {
    auction_stats: Option<widgets::AuctionSummary>,
    proposal_countdowns: Option<Vec<widgets::ProposalCountdown>>,
    voting_power: Option<widgets::VotingPowerSummary>,
    degraded: bool,
}

/// One payload per sidebar render: only the widgets the user has enabled
/// are computed.
async fn widget_panel(State(ctx): State<Arc<AppContext>>) -> Json<WidgetPanel> {
    let settings = ctx.store.current();
    let dao = settings.selected_dao;
    let mut panel = WidgetPanel::default();

    if settings.widgets.iter().any(|w| w == "auction-stats") {
        let snapshot = ctx.auctions.current(dao).await;
        panel.degraded |= snapshot.degraded;
        if let Some(Some(auction)) = snapshot.data {
            panel.auction_stats = Some(widgets::auction_summary(&auction, Utc::now().timestamp()));
        }
    }

    if settings.widgets.iter().any(|w| w == "proposal-countdown") {
        let block = ctx.chain.current_block().await;
        let proposals = ctx.proposals.active(dao).await;
        panel.degraded |= proposals.degraded;
        if let (Some(block), Some(proposals)) = (block.data, proposals.data.as_deref()) {
            panel.proposal_countdowns = Some(widgets::proposal_countdowns(proposals, block));
        }
    }

    let wants_voting_power = settings
        .widgets
        .iter()
        .any(|w| w == "voting-power" || w == "favorite-delegates");
    if wants_voting_power {
        let snapshot = ctx
            .delegates
            .page(
                dao,
                1,
                DELEGATES_PER_PAGE,
                DelegateOrder::default(),
                OrderDirection::default(),
            )
            .await;
        panel.degraded |= snapshot.degraded;
        if let Some(delegates) = snapshot.data.as_deref() {
            panel.voting_power = Some(widgets::favorite_voting_power(
                delegates,
                &settings.favorite_delegates,
            ));
        }
    }

    Json(panel)
}

async fn get_settings(State(ctx): State<Arc<AppContext>>) -> Json<AppSettings> {
    Json(ctx.store.current())
}

async fn select_dao(
    State(ctx): State<Arc<AppContext>>,
    Path(dao): Path<String>,
) -> Result<Json<AppSettings>, ApiError> {
    let dao: Dao = dao.parse().map_err(bad_request)?;
    ctx.store
        .set_selected_dao(dao)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(ctx.store.current()))
}

#[derive(Debug, Serialize)]
struct FavoriteToggled {
    favorite: bool,
}

async fn toggle_favorite_proposal(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<FavoriteToggled>, ApiError> {
    let favorite = ctx
        .store
        .toggle_favorite_proposal(&id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(FavoriteToggled { favorite }))
}

async fn toggle_favorite_delegate(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<FavoriteToggled>, ApiError> {
    let favorite = ctx
        .store
        .toggle_favorite_delegate(&id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(FavoriteToggled { favorite }))
}

async fn add_widget(
    State(ctx): State<Arc<AppContext>>,
    Path(kind): Path<String>,
) -> Result<Json<AppSettings>, ApiError> {
    ctx.store.add_widget(&kind).map_err(bad_request)?;
    Ok(Json(ctx.store.current()))
}

async fn remove_widget(
    State(ctx): State<Arc<AppContext>>,
    Path(kind): Path<String>,
) -> Result<Json<AppSettings>, ApiError> {
    ctx.store
        .remove_widget(&kind)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(ctx.store.current()))
}
