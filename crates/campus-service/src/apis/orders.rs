//! Order endpoint logic.
//!
//! Thin translation layer between the HTTP handlers and the order
//! lifecycle engine.

use campus_order::OrderError;
use campus_types::{ApiError, OrderAction, OrderResponse, RequestContext, SubmitOrderRequest};
use serde::Deserialize;

use crate::server::AppState;

/// Query parameters for GET /api/orders.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
	/// "pending" (default), "mine", or "courier".
	pub view: Option<String>,
}

pub async fn submit(
	state: &AppState,
	ctx: &RequestContext,
	request: SubmitOrderRequest,
) -> Result<OrderResponse, ApiError> {
	let order = state
		.orders
		.submit_order(ctx, request)
		.await
		.map_err(map_error)?;
	Ok(OrderResponse::from(order))
}

pub async fn list(
	state: &AppState,
	ctx: &RequestContext,
	query: ListQuery,
) -> Result<Vec<OrderResponse>, ApiError> {
	let orders = match query.view.as_deref() {
		None | Some("pending") => state.orders.list_pending().await,
		Some("mine") => state.orders.list_for_customer(ctx).await,
		Some("courier") => state.orders.list_for_courier(ctx).await,
		Some(other) => {
			return Err(ApiError::BadRequest {
				error_type: "VALIDATION_ERROR".to_string(),
				message: format!("unknown view '{}'", other),
				details: None,
			})
		},
	}
	.map_err(map_error)?;

	Ok(orders.into_iter().map(OrderResponse::from).collect())
}

pub async fn get(state: &AppState, order_id: &str) -> Result<OrderResponse, ApiError> {
	let order = state.orders.get_order(order_id).await.map_err(map_error)?;
	Ok(OrderResponse::from(order))
}

pub async fn apply_action(
	state: &AppState,
	ctx: &RequestContext,
	order_id: &str,
	action: OrderAction,
) -> Result<OrderResponse, ApiError> {
	let order = match action {
		OrderAction::Confirm => state.orders.accept_order(ctx, order_id).await,
		OrderAction::UpdateStatus { status } => {
			state.orders.advance_status(ctx, order_id, status).await
		},
	}
	.map_err(map_error)?;

	Ok(OrderResponse::from(order))
}

/// Maps engine errors onto the API error taxonomy.
fn map_error(err: OrderError) -> ApiError {
	match err {
		OrderError::Validation(message) => ApiError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message,
			details: None,
		},
		OrderError::Forbidden(message) => ApiError::Forbidden {
			error_type: "NOT_ALLOWED".to_string(),
			message,
		},
		OrderError::Conflict(message) => ApiError::Conflict {
			error_type: "ORDER_NOT_AVAILABLE".to_string(),
			message,
		},
		OrderError::NotFound(id) => ApiError::NotFound {
			error_type: "ORDER_NOT_FOUND".to_string(),
			message: format!("order '{}' not found", id),
		},
		OrderError::Storage(message) => {
			tracing::error!("order storage failure: {}", message);
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
			map_error(OrderError::Validation("price".to_string())).status_code(),
			400
		);
		assert_eq!(
			map_error(OrderError::Forbidden("role".to_string())).status_code(),
			403
		);
		assert_eq!(
			map_error(OrderError::NotFound("o-1".to_string())).status_code(),
			404
		);
		assert_eq!(
			map_error(OrderError::Conflict("taken".to_string())).status_code(),
			409
		);
		assert_eq!(
			map_error(OrderError::Storage("io".to_string())).status_code(),
			500
		);
	}

	#[test]
	fn test_storage_detail_not_leaked() {
		let api = map_error(OrderError::Storage("/var/data unreadable".to_string()));
		let body = api.to_error_response();
		assert!(!body.message.contains("/var/data"));
	}
}
