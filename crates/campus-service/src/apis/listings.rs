//! Exchange listing endpoint logic.
//!
//! Thin translation layer between the HTTP handlers and the exchange
//! lifecycle engine. Every listing leaving this module goes through
//! [`ListingResponse::for_viewer`] so the secret code is never exposed to
//! a caller who is not entitled to it.

use campus_exchange::ExchangeError;
use campus_types::{
	ApiError, CreateListingRequest, ListingAction, ListingResponse, RequestContext,
};
use serde::Deserialize;

use crate::server::AppState;

/// Query parameters for GET /api/exchange/listings.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
	/// "active" (default), "mine", or "purchases".
	pub view: Option<String>,
}

pub async fn create(
	state: &AppState,
	ctx: &RequestContext,
	request: CreateListingRequest,
) -> Result<ListingResponse, ApiError> {
	let listing = state
		.exchange
		.create_listing(ctx, request)
		.await
		.map_err(map_error)?;
	Ok(ListingResponse::for_viewer(listing, ctx.user_id()))
}

pub async fn list(
	state: &AppState,
	ctx: &RequestContext,
	query: ListQuery,
) -> Result<Vec<ListingResponse>, ApiError> {
	let listings = match query.view.as_deref() {
		None | Some("active") => state.exchange.list_active().await,
		Some("mine") => state.exchange.list_for_seller(ctx).await,
		Some("purchases") => state.exchange.list_for_buyer(ctx).await,
		Some(other) => {
			return Err(ApiError::BadRequest {
				error_type: "VALIDATION_ERROR".to_string(),
				message: format!("unknown view '{}'", other),
				details: None,
			})
		},
	}
	.map_err(map_error)?;

	Ok(listings
		.into_iter()
		.map(|listing| ListingResponse::for_viewer(listing, ctx.user_id()))
		.collect())
}

pub async fn get(
	state: &AppState,
	ctx: &RequestContext,
	listing_id: &str,
) -> Result<ListingResponse, ApiError> {
	let listing = state
		.exchange
		.get_listing(listing_id)
		.await
		.map_err(map_error)?;
	Ok(ListingResponse::for_viewer(listing, ctx.user_id()))
}

pub async fn apply_action(
	state: &AppState,
	ctx: &RequestContext,
	listing_id: &str,
	action: ListingAction,
) -> Result<ListingResponse, ApiError> {
	let listing = match action {
		ListingAction::Flag { reason } => state.exchange.flag(ctx, listing_id, reason).await,
		ListingAction::Purchase => state.exchange.purchase(ctx, listing_id).await,
		ListingAction::ConfirmPayment => state.exchange.confirm_payment(ctx, listing_id).await,
		ListingAction::Cancel => state.exchange.cancel(ctx, listing_id).await,
		ListingAction::Expire => state.exchange.expire(listing_id).await,
	}
	.map_err(map_error)?;

	Ok(ListingResponse::for_viewer(listing, ctx.user_id()))
}

/// Maps engine errors onto the API error taxonomy.
fn map_error(err: ExchangeError) -> ApiError {
	match err {
		ExchangeError::Validation(message) => ApiError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message,
			details: None,
		},
		ExchangeError::Forbidden(message) => ApiError::Forbidden {
			error_type: "NOT_ALLOWED".to_string(),
			message,
		},
		ExchangeError::Conflict(message) => ApiError::Conflict {
			error_type: "LISTING_NOT_AVAILABLE".to_string(),
			message,
		},
		ExchangeError::NotFound(id) => ApiError::NotFound {
			error_type: "LISTING_NOT_FOUND".to_string(),
			message: format!("listing '{}' not found", id),
		},
		ExchangeError::Storage(message) => {
			tracing::error!("listing storage failure: {}", message);
			ApiError::InternalServerError {
				error_type: "STORAGE_ERROR".to_string(),
				message: "storage backend failure".to_string(),
			}
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_error_taxonomy_stays_distinct() {
		assert_eq!(
			map_error(ExchangeError::Validation("price".to_string())).status_code(),
			400
		);
		assert_eq!(
			map_error(ExchangeError::Forbidden("seller".to_string())).status_code(),
			403
		);
		assert_eq!(
			map_error(ExchangeError::NotFound("l-1".to_string())).status_code(),
			404
		);
		assert_eq!(
			map_error(ExchangeError::Conflict("sold".to_string())).status_code(),
			409
		);
	}
}
