//! API types for the campus delivery HTTP API.
//!
//! This module defines the request and response bodies for the order and
//! exchange endpoints, together with the structured API error type and its
//! HTTP status mapping. Stored documents use snake_case field names; API
//! bodies use camelCase.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ExchangeListing, ListingStatus, Order, OrderStatus};

/// Request body for submitting a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
	/// Campus vendor the food is ordered from.
	pub restaurant_location: String,
	/// Vendor category.
	pub restaurant_type: String,
	/// Where the courier should deliver.
	pub delivery_location: String,
	/// Customer display name for the courier.
	pub full_name: String,
	/// Customer contact phone.
	pub phone: String,
	/// Order total in currency units, computed client-side.
	pub price: u32,
	/// Vendor-specific free-text order reference.
	pub order_code: String,
	/// Optional notes for the courier.
	pub extra_notes: Option<String>,
}

/// Actions accepted by `PATCH /api/orders/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OrderAction {
	/// A courier accepts the order. The courier triple is taken from the
	/// caller's resolved identity.
	Confirm,
	/// Advance the order status (prepayment, delivering, delivered).
	UpdateStatus { status: OrderStatus },
}

/// Order representation returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
	pub id: String,
	pub created_at: i64,
	pub user_id: String,
	pub restaurant_location: String,
	pub restaurant_type: String,
	pub delivery_location: String,
	pub full_name: String,
	pub phone: String,
	pub price: u32,
	pub order_code: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub extra_notes: Option<String>,
	pub status: OrderStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery_person_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery_person_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery_person_phone: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub confirmed_at: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivered_at: Option<i64>,
}

impl From<Order> for OrderResponse {
	fn from(order: Order) -> Self {
		Self {
			id: order.id,
			created_at: order.created_at,
			user_id: order.user_id,
			restaurant_location: order.restaurant_location,
			restaurant_type: order.restaurant_type,
			delivery_location: order.delivery_location,
			full_name: order.full_name,
			phone: order.phone,
			price: order.price,
			order_code: order.order_code,
			extra_notes: order.extra_notes,
			status: order.status,
			delivery_person_id: order.delivery_person_id,
			delivery_person_name: order.delivery_person_name,
			delivery_person_phone: order.delivery_person_phone,
			confirmed_at: order.confirmed_at,
			delivered_at: order.delivered_at,
		}
	}
}

/// Request body for creating a new exchange listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
	/// Short name of the code being sold.
	pub item_name: String,
	/// Free-text description.
	pub description: String,
	/// Asking price in currency units.
	pub price: u32,
	/// The secret code being sold.
	pub code_value: String,
	/// Payment destination shown to the buyer.
	pub user_card_number: String,
}

/// Actions accepted by `PATCH /api/exchange/listings/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ListingAction {
	/// Report the listing. Three flags hide it.
	Flag { reason: String },
	/// Claim the listing as a buyer.
	Purchase,
	/// Seller confirms off-platform payment, unlocking the code.
	ConfirmPayment,
	/// Seller withdraws an active listing.
	Cancel,
	/// Mark a lapsed listing as expired.
	Expire,
}

/// Listing representation returned by the API, with the secret code
/// redacted according to the viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
	pub id: String,
	pub created_at: i64,
	pub user_id: String,
	pub user_name: String,
	pub user_card_number: String,
	pub item_name: String,
	pub description: String,
	pub price: u32,
	/// Present only for the seller, or for the buyer once payment has
	/// been confirmed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code_value: Option<String>,
	pub status: ListingStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub buyer_id: Option<String>,
	pub flag_count: u32,
	pub expires_at: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub payment_confirmed_at: Option<i64>,
}

impl ListingResponse {
	/// Builds the API view of a listing for the given viewer, redacting
	/// `code_value` unless the viewer is entitled to it.
	pub fn for_viewer(listing: ExchangeListing, viewer_id: &str) -> Self {
		let code_value = if listing.code_visible_to(viewer_id) {
			Some(listing.code_value.clone())
		} else {
			None
		};
		Self {
			id: listing.id,
			created_at: listing.created_at,
			user_id: listing.user_id,
			user_name: listing.user_name,
			user_card_number: listing.user_card_number,
			item_name: listing.item_name,
			description: listing.description,
			price: listing.price,
			code_value,
			status: listing.status,
			buyer_id: listing.buyer_id,
			flag_count: listing.flag_count,
			expires_at: listing.expires_at,
			payment_confirmed_at: listing.payment_confirmed_at,
		}
	}
}

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code.
	pub error: String,
	/// Human-readable description.
	pub message: String,
	/// Additional error context.
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with appropriate HTTP status mapping.
///
/// The four-way taxonomy (validation / authorization / conflict /
/// not-found) is kept distinct all the way to the client; collapsing them
/// into one generic error would lose information the UI depends on.
#[derive(Debug)]
pub enum ApiError {
	/// Malformed or out-of-range input (400).
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Caller is not the required role for the action (403).
	Forbidden { error_type: String, message: String },
	/// Referenced entity does not exist (404).
	NotFound { error_type: String, message: String },
	/// Entity is not in the state required for the transition (409).
	Conflict { error_type: String, message: String },
	/// Internal server error (500).
	InternalServerError { error_type: String, message: String },
}

impl ApiError {
	/// Returns the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			ApiError::BadRequest { .. } => 400,
			ApiError::Forbidden { .. } => 403,
			ApiError::NotFound { .. } => 404,
			ApiError::Conflict { .. } => 409,
			ApiError::InternalServerError { .. } => 500,
		}
	}

	/// Converts to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			ApiError::BadRequest {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
			ApiError::Forbidden {
				error_type,
				message,
			}
			| ApiError::NotFound {
				error_type,
				message,
			}
			| ApiError::Conflict {
				error_type,
				message,
			}
			| ApiError::InternalServerError {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
		}
	}
}

impl fmt::Display for ApiError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ApiError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			ApiError::Forbidden { message, .. } => write!(f, "Forbidden: {}", message),
			ApiError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			ApiError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			ApiError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for ApiError {}

impl axum::response::IntoResponse for ApiError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let error_response = self.to_error_response();
		(status, Json(error_response)).into_response()
	}
}
