//! HTTP server for the campus delivery API.
//!
//! This module builds the axum router for the order and exchange
//! endpoints. Handlers stay thin: they authenticate the caller, delegate
//! to the API modules, and wrap the result in JSON.

use axum::{
	extract::{Path, Query, State},
	http::HeaderMap,
	response::Json,
	routing::{get, post},
	Router,
};
use campus_config::{ApiConfig, Config};
use campus_exchange::ExchangeLifecycle;
use campus_identity::IdentityService;
use campus_order::OrderLifecycle;
use campus_types::{
	ApiError, CreateListingRequest, ListingAction, ListingResponse, OrderAction, OrderResponse,
	SubmitOrderRequest,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::apis;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Order lifecycle engine.
	pub orders: Arc<OrderLifecycle>,
	/// Exchange listing lifecycle engine.
	pub exchange: Arc<ExchangeLifecycle>,
	/// Identity service resolving session tokens.
	pub identity: Arc<IdentityService>,
	/// Complete configuration.
	pub config: Config,
}

/// Builds the router with the /api base path.
pub fn build_router(state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_submit_order).get(handle_list_orders))
				.route("/orders/{id}", get(handle_get_order).patch(handle_patch_order))
				.route(
					"/exchange/listings",
					post(handle_create_listing).get(handle_list_listings),
				)
				.route(
					"/exchange/listings/{id}",
					get(handle_get_listing).patch(handle_patch_listing),
				),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(state)
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	state: AppState,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = build_router(state);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Campus delivery API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles POST /api/orders requests.
async fn handle_submit_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<SubmitOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
	let ctx = apis::authenticate(&state, &headers).await?;
	let order = apis::orders::submit(&state, &ctx, request).await?;
	Ok(Json(order))
}

/// Handles GET /api/orders requests.
///
/// `?view=pending` (default) is the feed couriers pick from; `?view=mine`
/// and `?view=courier` scope to the caller's own orders as customer or
/// courier respectively.
async fn handle_list_orders(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(query): Query<apis::orders::ListQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
	let ctx = apis::authenticate(&state, &headers).await?;
	let orders = apis::orders::list(&state, &ctx, query).await?;
	Ok(Json(orders))
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
	apis::authenticate(&state, &headers).await?;
	let order = apis::orders::get(&state, &id).await?;
	Ok(Json(order))
}

/// Handles PATCH /api/orders/{id} requests.
async fn handle_patch_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
	Json(action): Json<OrderAction>,
) -> Result<Json<OrderResponse>, ApiError> {
	let ctx = apis::authenticate(&state, &headers).await?;
	let order = apis::orders::apply_action(&state, &ctx, &id, action).await?;
	Ok(Json(order))
}

/// Handles POST /api/exchange/listings requests.
async fn handle_create_listing(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<CreateListingRequest>,
) -> Result<Json<ListingResponse>, ApiError> {
	let ctx = apis::authenticate(&state, &headers).await?;
	let listing = apis::listings::create(&state, &ctx, request).await?;
	Ok(Json(listing))
}

/// Handles GET /api/exchange/listings requests.
///
/// `?view=active` (default) is the public feed with lapsed listings
/// filtered out; `?view=mine` and `?view=purchases` scope to the caller.
async fn handle_list_listings(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(query): Query<apis::listings::ListQuery>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
	let ctx = apis::authenticate(&state, &headers).await?;
	let listings = apis::listings::list(&state, &ctx, query).await?;
	Ok(Json(listings))
}

/// Handles GET /api/exchange/listings/{id} requests.
async fn handle_get_listing(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
) -> Result<Json<ListingResponse>, ApiError> {
	let ctx = apis::authenticate(&state, &headers).await?;
	let listing = apis::listings::get(&state, &ctx, &id).await?;
	Ok(Json(listing))
}

/// Handles PATCH /api/exchange/listings/{id} requests.
async fn handle_patch_listing(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
	Json(action): Json<ListingAction>,
) -> Result<Json<ListingResponse>, ApiError> {
	let ctx = apis::authenticate(&state, &headers).await?;
	let listing = apis::listings::apply_action(&state, &ctx, &id, action).await?;
	Ok(Json(listing))
}
