//! Order lifecycle engine for the campus delivery system.
//!
//! Manages order state transitions with validation, ensuring orders move
//! through valid lifecycle states: pending -> confirmed ->
//! (waiting_for_payment ->) food_delivering -> delivered. Every transition
//! is a read followed by a guarded write against the storage collaborator,
//! so two couriers racing to accept the same pending order cannot both
//! succeed.

use campus_storage::{StorageError, StorageService};
use campus_types::{Order, OrderStatus, RequestContext, StorageKey, SubmitOrderRequest};
use chrono::Utc;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during order lifecycle operations.
///
/// The four-way taxonomy is deliberate: the UI distinguishes "invalid
/// input" from "not allowed" from "no longer available", so collapsing
/// variants would be a regression.
#[derive(Debug, Error)]
pub enum OrderError {
	/// Malformed or out-of-range input. No state change.
	#[error("Validation error: {0}")]
	Validation(String),
	/// Caller is not the required role for this transition. No state change.
	#[error("Not allowed: {0}")]
	Forbidden(String),
	/// The order is not in the state the transition requires, or it was
	/// modified concurrently. No state change.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// The referenced order does not exist.
	#[error("Order not found: {0}")]
	NotFound(String),
	/// A failure in the storage collaborator.
	#[error("Storage error: {0}")]
	Storage(String),
}

impl OrderError {
	fn from_storage(err: StorageError, order_id: &str) -> Self {
		match err {
			StorageError::NotFound => OrderError::NotFound(order_id.to_string()),
			StorageError::Conflict => {
				OrderError::Conflict("order no longer available".to_string())
			},
			other => OrderError::Storage(other.to_string()),
		}
	}
}

// Static transition table - each state maps to allowed next states
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::Pending,
		HashSet::from([OrderStatus::Confirmed]),
	);
	m.insert(
		OrderStatus::Confirmed,
		HashSet::from([
			OrderStatus::WaitingForPayment,
			OrderStatus::FoodDelivering,
			OrderStatus::Delivered,
		]),
	);
	m.insert(
		OrderStatus::WaitingForPayment,
		HashSet::from([OrderStatus::FoodDelivering, OrderStatus::Delivered]),
	);
	m.insert(
		OrderStatus::FoodDelivering,
		HashSet::from([OrderStatus::Delivered]),
	);
	m.insert(OrderStatus::Delivered, HashSet::new()); // terminal
	m
});

/// Checks if a state transition is legal.
fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
	TRANSITIONS.get(&from).is_some_and(|set| set.contains(&to))
}

fn now_timestamp() -> i64 {
	Utc::now().timestamp()
}

/// Manages order state transitions and persistence.
pub struct OrderLifecycle {
	storage: Arc<StorageService>,
}

impl OrderLifecycle {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Creates a new order in `pending` status.
	///
	/// The id and creation timestamp are server-assigned; the price is
	/// taken as given and never recomputed by the engine.
	pub async fn submit_order(
		&self,
		ctx: &RequestContext,
		request: SubmitOrderRequest,
	) -> Result<Order, OrderError> {
		validate_submit(&request)?;

		let order = Order {
			id: Uuid::new_v4().to_string(),
			created_at: now_timestamp(),
			user_id: ctx.user_id().to_string(),
			restaurant_location: request.restaurant_location,
			restaurant_type: request.restaurant_type,
			delivery_location: request.delivery_location,
			full_name: request.full_name,
			phone: request.phone,
			price: request.price,
			order_code: request.order_code,
			extra_notes: request.extra_notes,
			status: OrderStatus::Pending,
			delivery_person_id: None,
			delivery_person_name: None,
			delivery_person_phone: None,
			confirmed_at: None,
			delivered_at: None,
		};

		self.storage
			.store(StorageKey::Orders.as_str(), &order.id, &order)
			.await
			.map_err(|e| OrderError::Storage(e.to_string()))?;

		tracing::info!(order_id = %order.id, user_id = %order.user_id, "order submitted");
		Ok(order)
	}

	/// A courier accepts a pending order: pending -> confirmed.
	///
	/// The courier triple is taken from the caller's resolved identity and
	/// committed together with the status in a single guarded write, so a
	/// reader sees either `pending` with no courier or `confirmed` with a
	/// fully populated triple. Exactly one of two racing accepts succeeds;
	/// the loser receives a conflict.
	pub async fn accept_order(
		&self,
		ctx: &RequestContext,
		order_id: &str,
	) -> Result<Order, OrderError> {
		if ctx.user.phone.is_empty() {
			return Err(OrderError::Validation(
				"courier phone number is required to accept orders".to_string(),
			));
		}

		let (mut order, snapshot): (Order, Vec<u8>) = self
			.storage
			.retrieve_raw(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| OrderError::from_storage(e, order_id))?;

		if order.status != OrderStatus::Pending {
			return Err(OrderError::Conflict("order no longer available".to_string()));
		}

		order.status = OrderStatus::Confirmed;
		order.delivery_person_id = Some(ctx.user_id().to_string());
		order.delivery_person_name = Some(ctx.user.name.clone());
		order.delivery_person_phone = Some(ctx.user.phone.clone());
		order.confirmed_at = Some(now_timestamp());

		self.storage
			.update_guarded(StorageKey::Orders.as_str(), order_id, &snapshot, &order)
			.await
			.map_err(|e| OrderError::from_storage(e, order_id))?;

		tracing::info!(order_id = %order.id, courier_id = %ctx.user_id(), "order accepted");
		Ok(order)
	}

	/// Advances an order to a later status.
	///
	/// `waiting_for_payment` and `food_delivering` may only be set by the
	/// assigned courier; `delivered` converges the customer-confirms and
	/// courier-marks-delivered paths and is handled by
	/// [`OrderLifecycle::mark_delivered`].
	pub async fn advance_status(
		&self,
		ctx: &RequestContext,
		order_id: &str,
		to: OrderStatus,
	) -> Result<Order, OrderError> {
		match to {
			OrderStatus::Delivered => return self.mark_delivered(ctx, order_id).await,
			OrderStatus::Pending | OrderStatus::Confirmed => {
				return Err(OrderError::Validation(format!(
					"status '{}' cannot be set through updateStatus",
					to
				)));
			},
			OrderStatus::WaitingForPayment | OrderStatus::FoodDelivering => {},
		}

		let (mut order, snapshot): (Order, Vec<u8>) = self
			.storage
			.retrieve_raw(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| OrderError::from_storage(e, order_id))?;

		if !order.is_assigned_courier(ctx.user_id()) {
			return Err(OrderError::Forbidden(
				"only the assigned courier may advance this order".to_string(),
			));
		}
		if !is_valid_transition(order.status, to) {
			return Err(OrderError::Conflict(format!(
				"cannot move order from '{}' to '{}'",
				order.status, to
			)));
		}

		order.status = to;

		self.storage
			.update_guarded(StorageKey::Orders.as_str(), order_id, &snapshot, &order)
			.await
			.map_err(|e| OrderError::from_storage(e, order_id))?;

		tracing::info!(order_id = %order.id, status = %to, "order status advanced");
		Ok(order)
	}

	/// Marks an order as delivered, setting `delivered_at`.
	///
	/// Allowed for the customer (confirming receipt) and for the assigned
	/// courier. Re-invoking on an already-delivered order is a no-op
	/// rather than an error, so `delivered_at` can never be corrupted by
	/// a repeated confirmation.
	pub async fn mark_delivered(
		&self,
		ctx: &RequestContext,
		order_id: &str,
	) -> Result<Order, OrderError> {
		let (mut order, snapshot): (Order, Vec<u8>) = self
			.storage
			.retrieve_raw(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| OrderError::from_storage(e, order_id))?;

		let is_customer = order.user_id == ctx.user_id();
		if !is_customer && !order.is_assigned_courier(ctx.user_id()) {
			return Err(OrderError::Forbidden(
				"only the customer or the assigned courier may mark this order delivered"
					.to_string(),
			));
		}

		if order.is_terminal() {
			return Ok(order);
		}
		if !is_valid_transition(order.status, OrderStatus::Delivered) {
			return Err(OrderError::Conflict(format!(
				"cannot mark a '{}' order delivered",
				order.status
			)));
		}

		order.status = OrderStatus::Delivered;
		order.delivered_at = Some(now_timestamp());

		self.storage
			.update_guarded(StorageKey::Orders.as_str(), order_id, &snapshot, &order)
			.await
			.map_err(|e| OrderError::from_storage(e, order_id))?;

		tracing::info!(order_id = %order.id, "order delivered");
		Ok(order)
	}

	/// Gets an order by id.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| OrderError::from_storage(e, order_id))
	}

	/// Lists all pending orders, newest first. This is the feed couriers
	/// pick from.
	pub async fn list_pending(&self) -> Result<Vec<Order>, OrderError> {
		self.list_filtered(|o| o.status == OrderStatus::Pending).await
	}

	/// Lists the caller's own orders, newest first.
	pub async fn list_for_customer(&self, ctx: &RequestContext) -> Result<Vec<Order>, OrderError> {
		let user_id = ctx.user_id().to_string();
		self.list_filtered(move |o| o.user_id == user_id).await
	}

	/// Lists orders assigned to the caller as courier, newest first.
	pub async fn list_for_courier(&self, ctx: &RequestContext) -> Result<Vec<Order>, OrderError> {
		let user_id = ctx.user_id().to_string();
		self.list_filtered(move |o| o.is_assigned_courier(&user_id)).await
	}

	async fn list_filtered<F>(&self, predicate: F) -> Result<Vec<Order>, OrderError>
	where
		F: Fn(&Order) -> bool,
	{
		let mut orders: Vec<Order> = self
			.storage
			.retrieve_all(StorageKey::Orders.as_str())
			.await
			.map_err(|e| OrderError::Storage(e.to_string()))?
			.into_iter()
			.filter(|o| predicate(o))
			.collect();
		orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(orders)
	}
}

/// Validates a submit request before any state is created.
fn validate_submit(request: &SubmitOrderRequest) -> Result<(), OrderError> {
	if request.price == 0 {
		return Err(OrderError::Validation("price must be positive".to_string()));
	}
	let required = [
		("restaurantLocation", &request.restaurant_location),
		("deliveryLocation", &request.delivery_location),
		("fullName", &request.full_name),
		("phone", &request.phone),
		("orderCode", &request.order_code),
	];
	for (name, value) in required {
		if value.is_empty() {
			return Err(OrderError::Validation(format!("{} is required", name)));
		}
	}
	Ok(())
}
