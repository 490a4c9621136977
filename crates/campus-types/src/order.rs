//! Order types for the campus delivery system.
//!
//! This module defines the order document stored by the persistence
//! collaborator and the status enumeration that the order lifecycle
//! engine transitions through.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A food-delivery order with its lifecycle state.
///
/// An order is created by a customer in `Pending` status and is carried to
/// completion by the courier that accepts it. The courier triple
/// (`delivery_person_id/name/phone`) is unset exactly while the order is
/// still pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Server-assigned unique identifier.
	pub id: String,
	/// Unix timestamp (seconds) when this order was created. Immutable.
	pub created_at: i64,
	/// Identifier of the customer that owns this order.
	pub user_id: String,
	/// Campus vendor the food is ordered from.
	pub restaurant_location: String,
	/// Vendor category (e.g. cafeteria, kiosk).
	pub restaurant_type: String,
	/// Where the courier should deliver.
	pub delivery_location: String,
	/// Customer display name for the courier.
	pub full_name: String,
	/// Customer contact phone.
	pub phone: String,
	/// Order total in currency units. Fixed at creation, never recomputed.
	pub price: u32,
	/// Vendor-specific free-text order reference.
	pub order_code: String,
	/// Optional free-text notes for the courier.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub extra_notes: Option<String>,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Identifier of the courier that accepted this order.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery_person_id: Option<String>,
	/// Display name of the assigned courier.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery_person_name: Option<String>,
	/// Contact phone of the assigned courier.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery_person_phone: Option<String>,
	/// Unix timestamp set when the order passed through `Confirmed`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub confirmed_at: Option<i64>,
	/// Unix timestamp set when the order reached `Delivered`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivered_at: Option<i64>,
}

impl Order {
	/// Returns true once the order has passed through `Confirmed`,
	/// i.e. a courier has been assigned.
	pub fn has_reached_confirmed(&self) -> bool {
		!matches!(self.status, OrderStatus::Pending)
	}

	/// Returns true when the order is in its terminal state.
	pub fn is_terminal(&self) -> bool {
		matches!(self.status, OrderStatus::Delivered)
	}

	/// Returns true if `user_id` identifies the assigned courier.
	pub fn is_assigned_courier(&self, user_id: &str) -> bool {
		self.delivery_person_id.as_deref() == Some(user_id)
	}
}

/// Status of an order in the delivery lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// Order has been submitted and is waiting for a courier.
	Pending,
	/// A courier has accepted the order.
	Confirmed,
	/// Vendor requires prepayment before the food is handed over.
	WaitingForPayment,
	/// The courier is on the way with the food.
	FoodDelivering,
	/// The order has been delivered. Terminal.
	Delivered,
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::Pending => write!(f, "pending"),
			OrderStatus::Confirmed => write!(f, "confirmed"),
			OrderStatus::WaitingForPayment => write!(f, "waiting_for_payment"),
			OrderStatus::FoodDelivering => write!(f, "food_delivering"),
			OrderStatus::Delivered => write!(f, "delivered"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_serde_round_trip() {
		let json = serde_json::to_string(&OrderStatus::WaitingForPayment).unwrap();
		assert_eq!(json, "\"waiting_for_payment\"");
		let status: OrderStatus = serde_json::from_str(&json).unwrap();
		assert_eq!(status, OrderStatus::WaitingForPayment);
	}

	#[test]
	fn test_optional_fields_omitted_when_pending() {
		let order = Order {
			id: "o-1".to_string(),
			created_at: 1_700_000_000,
			user_id: "u-1".to_string(),
			restaurant_location: "north-canteen".to_string(),
			restaurant_type: "cafeteria".to_string(),
			delivery_location: "dorm-12".to_string(),
			full_name: "Test Customer".to_string(),
			phone: "555-0100".to_string(),
			price: 25_000,
			order_code: "A17".to_string(),
			extra_notes: None,
			status: OrderStatus::Pending,
			delivery_person_id: None,
			delivery_person_name: None,
			delivery_person_phone: None,
			confirmed_at: None,
			delivered_at: None,
		};

		let value = serde_json::to_value(&order).unwrap();
		assert!(value.get("delivery_person_id").is_none());
		assert!(value.get("confirmed_at").is_none());
		assert!(!order.has_reached_confirmed());
	}
}
