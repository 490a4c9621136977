//! Exchange listing lifecycle engine.
//!
//! Manages the peer-to-peer code marketplace: listings move through
//! active -> sold / cancelled / flagged / expired, moderation is driven by
//! an append-only flag counter, and the sale itself is an honor-system
//! handshake (buyer claims, seller independently confirms payment, code
//! unlocks). As in the order engine, every transition is a read followed
//! by a guarded write so concurrent transitions on the same listing
//! cannot interleave.

pub mod expiry;

use campus_storage::{StorageError, StorageService};
use campus_types::{
	CreateListingRequest, ExchangeListing, ListingStatus, RequestContext, StorageKey,
	FLAG_HIDE_THRESHOLD, MAX_LISTING_PRICE,
};
use chrono::{Local, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during listing lifecycle operations.
#[derive(Debug, Error)]
pub enum ExchangeError {
	/// Malformed or out-of-range input. No state change.
	#[error("Validation error: {0}")]
	Validation(String),
	/// Caller is not the required role for this transition. No state change.
	#[error("Not allowed: {0}")]
	Forbidden(String),
	/// The listing is not in the state the transition requires, or it was
	/// modified concurrently. No state change.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// The referenced listing does not exist.
	#[error("Listing not found: {0}")]
	NotFound(String),
	/// A failure in the storage collaborator.
	#[error("Storage error: {0}")]
	Storage(String),
}

impl ExchangeError {
	fn from_storage(err: StorageError, listing_id: &str) -> Self {
		match err {
			StorageError::NotFound => ExchangeError::NotFound(listing_id.to_string()),
			StorageError::Conflict => {
				ExchangeError::Conflict("listing was modified, please retry".to_string())
			},
			other => ExchangeError::Storage(other.to_string()),
		}
	}
}

fn now_timestamp() -> i64 {
	Utc::now().timestamp()
}

/// Manages listing state transitions and persistence.
pub struct ExchangeLifecycle {
	storage: Arc<StorageService>,
}

impl ExchangeLifecycle {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Creates a new listing in `active` status.
	///
	/// The price bound and the 14:00 sales deadline are fixed here; a
	/// seller may hold at most one live active listing at a time.
	pub async fn create_listing(
		&self,
		ctx: &RequestContext,
		request: CreateListingRequest,
	) -> Result<ExchangeListing, ExchangeError> {
		validate_create(&request)?;

		// Duplicate prevention counts lapsed-but-unflipped listings as
		// already gone, same as every other "active" read path.
		let existing = self.list_for_seller(ctx).await?;
		let now = now_timestamp();
		if existing
			.iter()
			.any(|l| l.status == ListingStatus::Active && !l.is_lapsed(now))
		{
			return Err(ExchangeError::Conflict(
				"you already have an active listing".to_string(),
			));
		}

		let listing = ExchangeListing {
			id: Uuid::new_v4().to_string(),
			created_at: now,
			user_id: ctx.user_id().to_string(),
			user_name: ctx.user.name.clone(),
			user_card_number: request.user_card_number,
			item_name: request.item_name,
			description: request.description,
			price: request.price,
			code_value: request.code_value,
			status: ListingStatus::Active,
			buyer_id: None,
			flag_count: 0,
			flag_reasons: Vec::new(),
			expires_at: expiry::compute_expires_at(Local::now()).timestamp(),
			payment_confirmed_at: None,
		};

		self.storage
			.store(StorageKey::Listings.as_str(), &listing.id, &listing)
			.await
			.map_err(|e| ExchangeError::Storage(e.to_string()))?;

		tracing::info!(listing_id = %listing.id, seller_id = %listing.user_id, "listing created");
		Ok(listing)
	}

	/// Flags a listing for moderation.
	///
	/// Flagging is append-only; reaching [`FLAG_HIDE_THRESHOLD`] flags
	/// forces the listing into `flagged`, a one-way transition with no
	/// un-flag path.
	pub async fn flag(
		&self,
		ctx: &RequestContext,
		listing_id: &str,
		reason: String,
	) -> Result<ExchangeListing, ExchangeError> {
		if reason.trim().is_empty() {
			return Err(ExchangeError::Validation(
				"a flag reason is required".to_string(),
			));
		}

		let (mut listing, snapshot) = self.load(listing_id).await?;

		if listing.user_id == ctx.user_id() {
			return Err(ExchangeError::Forbidden(
				"you cannot flag your own listing".to_string(),
			));
		}
		self.ensure_active(&listing)?;

		listing.flag_reasons.push(reason);
		listing.flag_count += 1;
		if listing.flag_count >= FLAG_HIDE_THRESHOLD {
			listing.status = ListingStatus::Flagged;
		}

		self.commit(listing_id, &snapshot, &listing).await?;

		if listing.status == ListingStatus::Flagged {
			tracing::warn!(listing_id = %listing.id, flags = listing.flag_count, "listing auto-hidden");
		}
		Ok(listing)
	}

	/// A buyer claims an active listing: active -> sold.
	///
	/// The code stays hidden; it unlocks only once the seller confirms
	/// payment.
	pub async fn purchase(
		&self,
		ctx: &RequestContext,
		listing_id: &str,
	) -> Result<ExchangeListing, ExchangeError> {
		let (mut listing, snapshot) = self.load(listing_id).await?;

		if listing.user_id == ctx.user_id() {
			return Err(ExchangeError::Forbidden(
				"you cannot purchase your own listing".to_string(),
			));
		}
		self.ensure_active(&listing)?;

		listing.status = ListingStatus::Sold;
		listing.buyer_id = Some(ctx.user_id().to_string());

		self.commit(listing_id, &snapshot, &listing).await?;

		tracing::info!(listing_id = %listing.id, buyer_id = %ctx.user_id(), "listing purchased");
		Ok(listing)
	}

	/// The seller confirms that off-platform payment arrived.
	///
	/// From this moment the code becomes visible to the buyer. Confirming
	/// twice is a no-op so the confirmation timestamp is never rewritten.
	pub async fn confirm_payment(
		&self,
		ctx: &RequestContext,
		listing_id: &str,
	) -> Result<ExchangeListing, ExchangeError> {
		let (mut listing, snapshot) = self.load(listing_id).await?;

		if listing.user_id != ctx.user_id() {
			return Err(ExchangeError::Forbidden(
				"only the seller may confirm payment".to_string(),
			));
		}
		if listing.status != ListingStatus::Sold || listing.buyer_id.is_none() {
			return Err(ExchangeError::Conflict(
				"listing has no pending purchase to confirm".to_string(),
			));
		}
		if listing.payment_confirmed_at.is_some() {
			return Ok(listing);
		}

		listing.payment_confirmed_at = Some(now_timestamp());

		self.commit(listing_id, &snapshot, &listing).await?;

		tracing::info!(listing_id = %listing.id, "payment confirmed, code unlocked for buyer");
		Ok(listing)
	}

	/// The seller withdraws an active listing: active -> cancelled.
	pub async fn cancel(
		&self,
		ctx: &RequestContext,
		listing_id: &str,
	) -> Result<ExchangeListing, ExchangeError> {
		let (mut listing, snapshot) = self.load(listing_id).await?;

		if listing.user_id != ctx.user_id() {
			return Err(ExchangeError::Forbidden(
				"only the seller may cancel this listing".to_string(),
			));
		}
		self.ensure_active(&listing)?;

		listing.status = ListingStatus::Cancelled;

		self.commit(listing_id, &snapshot, &listing).await?;

		tracing::info!(listing_id = %listing.id, "listing cancelled");
		Ok(listing)
	}

	/// Flips a lapsed listing to `expired`.
	///
	/// Any caller may do this; expiry is normally applied lazily by the
	/// read paths, this just persists it eagerly.
	pub async fn expire(&self, listing_id: &str) -> Result<ExchangeListing, ExchangeError> {
		let (mut listing, snapshot) = self.load(listing_id).await?;

		if listing.status == ListingStatus::Expired {
			return Ok(listing);
		}
		if !listing.is_lapsed(now_timestamp()) {
			return Err(ExchangeError::Conflict(
				"listing has not passed its sales deadline".to_string(),
			));
		}

		listing.status = ListingStatus::Expired;
		self.commit(listing_id, &snapshot, &listing).await?;
		Ok(listing)
	}

	/// Gets a listing by id, applying lazy expiry.
	///
	/// A stored status can be stale past its deadline; single-document
	/// reads persist the flip to `expired` so later readers agree.
	pub async fn get_listing(&self, listing_id: &str) -> Result<ExchangeListing, ExchangeError> {
		let (mut listing, snapshot) = self.load(listing_id).await?;

		if listing.is_lapsed(now_timestamp()) {
			listing.status = ListingStatus::Expired;
			match self.commit(listing_id, &snapshot, &listing).await {
				Ok(()) => {},
				// Someone else transitioned it first; their write wins.
				Err(ExchangeError::Conflict(_)) => return self.load(listing_id).await.map(|(l, _)| l),
				Err(e) => return Err(e),
			}
		}
		Ok(listing)
	}

	/// Lists all listings that are genuinely purchasable right now:
	/// stored status `active` and deadline not passed. Newest first.
	pub async fn list_active(&self) -> Result<Vec<ExchangeListing>, ExchangeError> {
		let now = now_timestamp();
		self.list_filtered(move |l| l.status == ListingStatus::Active && !l.is_lapsed(now))
			.await
	}

	/// Lists the caller's own listings in any status, newest first.
	pub async fn list_for_seller(
		&self,
		ctx: &RequestContext,
	) -> Result<Vec<ExchangeListing>, ExchangeError> {
		let user_id = ctx.user_id().to_string();
		self.list_filtered(move |l| l.user_id == user_id).await
	}

	/// Lists the listings the caller has purchased, newest first.
	pub async fn list_for_buyer(
		&self,
		ctx: &RequestContext,
	) -> Result<Vec<ExchangeListing>, ExchangeError> {
		let user_id = ctx.user_id().to_string();
		self.list_filtered(move |l| l.buyer_id.as_deref() == Some(user_id.as_str()))
			.await
	}

	async fn load(&self, listing_id: &str) -> Result<(ExchangeListing, Vec<u8>), ExchangeError> {
		self.storage
			.retrieve_raw(StorageKey::Listings.as_str(), listing_id)
			.await
			.map_err(|e| ExchangeError::from_storage(e, listing_id))
	}

	async fn commit(
		&self,
		listing_id: &str,
		snapshot: &[u8],
		listing: &ExchangeListing,
	) -> Result<(), ExchangeError> {
		self.storage
			.update_guarded(StorageKey::Listings.as_str(), listing_id, snapshot, listing)
			.await
			.map_err(|e| ExchangeError::from_storage(e, listing_id))
	}

	/// Rejects transitions on anything that is not purchasable: wrong
	/// stored status, or active past its deadline.
	fn ensure_active(&self, listing: &ExchangeListing) -> Result<(), ExchangeError> {
		if listing.status != ListingStatus::Active || listing.is_lapsed(now_timestamp()) {
			return Err(ExchangeError::Conflict(
				"listing is not available for purchase".to_string(),
			));
		}
		Ok(())
	}

	async fn list_filtered<F>(&self, predicate: F) -> Result<Vec<ExchangeListing>, ExchangeError>
	where
		F: Fn(&ExchangeListing) -> bool,
	{
		let mut listings: Vec<ExchangeListing> = self
			.storage
			.retrieve_all(StorageKey::Listings.as_str())
			.await
			.map_err(|e| ExchangeError::Storage(e.to_string()))?
			.into_iter()
			.filter(|l| predicate(l))
			.collect();
		listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(listings)
	}
}

/// Validates a create request before any state is created.
fn validate_create(request: &CreateListingRequest) -> Result<(), ExchangeError> {
	if request.price == 0 || request.price > MAX_LISTING_PRICE {
		return Err(ExchangeError::Validation(format!(
			"price must be between 1 and {}",
			MAX_LISTING_PRICE
		)));
	}
	let required = [
		("itemName", &request.item_name),
		("codeValue", &request.code_value),
		("userCardNumber", &request.user_card_number),
	];
	for (name, value) in required {
		if value.is_empty() {
			return Err(ExchangeError::Validation(format!("{} is required", name)));
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use campus_storage::implementations::memory::MemoryStorage;
	use campus_types::{ListingResponse, UserProfile};

	fn engine() -> (ExchangeLifecycle, Arc<StorageService>) {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		(ExchangeLifecycle::new(Arc::clone(&storage)), storage)
	}

	fn ctx(id: &str) -> RequestContext {
		RequestContext::new(UserProfile {
			id: id.to_string(),
			name: format!("{} name", id),
			email: format!("{}@campus.edu", id),
			phone: "555-0100".to_string(),
			email_verified: true,
		})
	}

	fn request(price: u32) -> CreateListingRequest {
		CreateListingRequest {
			item_name: "coffee voucher".to_string(),
			description: "10% off at the east kiosk".to_string(),
			price,
			code_value: "SECRET-CODE".to_string(),
			user_card_number: "1234-5678".to_string(),
		}
	}

	/// Plants a listing document directly in storage, bypassing the
	/// engine, to control `expires_at`.
	async fn plant(storage: &StorageService, listing: &ExchangeListing) {
		storage
			.store(StorageKey::Listings.as_str(), &listing.id, listing)
			.await
			.unwrap();
	}

	fn lapsed_listing(id: &str, seller: &str) -> ExchangeListing {
		ExchangeListing {
			id: id.to_string(),
			created_at: 0,
			user_id: seller.to_string(),
			user_name: "Seller".to_string(),
			user_card_number: "1234".to_string(),
			item_name: "stale voucher".to_string(),
			description: String::new(),
			price: 100,
			code_value: "OLD".to_string(),
			status: ListingStatus::Active,
			buyer_id: None,
			flag_count: 0,
			flag_reasons: Vec::new(),
			expires_at: 1, // long past
			payment_confirmed_at: None,
		}
	}

	#[tokio::test]
	async fn test_price_bounds() {
		let (engine, _) = engine();
		let seller = ctx("seller");

		assert!(matches!(
			engine.create_listing(&seller, request(0)).await,
			Err(ExchangeError::Validation(_))
		));
		assert!(matches!(
			engine.create_listing(&seller, request(60_001)).await,
			Err(ExchangeError::Validation(_))
		));

		let listing = engine.create_listing(&seller, request(60_000)).await.unwrap();
		assert_eq!(listing.status, ListingStatus::Active);
		assert_eq!(listing.price, 60_000);
	}

	#[tokio::test]
	async fn test_seller_limited_to_one_active_listing() {
		let (engine, _) = engine();
		let seller = ctx("seller");

		engine.create_listing(&seller, request(1000)).await.unwrap();
		let second = engine.create_listing(&seller, request(2000)).await;
		assert!(matches!(second, Err(ExchangeError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_lapsed_listing_does_not_block_new_one() {
		let (engine, storage) = engine();
		let seller = ctx("seller");

		plant(&storage, &lapsed_listing("old", "seller")).await;
		let listing = engine.create_listing(&seller, request(1000)).await.unwrap();
		assert_eq!(listing.status, ListingStatus::Active);
	}

	#[tokio::test]
	async fn test_flag_threshold_forces_flagged() {
		let (engine, _) = engine();
		let seller = ctx("seller");
		let listing = engine.create_listing(&seller, request(1000)).await.unwrap();

		let own = engine.flag(&seller, &listing.id, "mine".to_string()).await;
		assert!(matches!(own, Err(ExchangeError::Forbidden(_))));

		let l = engine
			.flag(&ctx("u1"), &listing.id, "looks fake".to_string())
			.await
			.unwrap();
		assert_eq!(l.status, ListingStatus::Active);
		let l = engine
			.flag(&ctx("u2"), &listing.id, "scam".to_string())
			.await
			.unwrap();
		assert_eq!(l.status, ListingStatus::Active);
		assert_eq!(l.flag_count, 2);

		let l = engine
			.flag(&ctx("u3"), &listing.id, "definitely a scam".to_string())
			.await
			.unwrap();
		assert_eq!(l.status, ListingStatus::Flagged);
		assert_eq!(l.flag_count, 3);
		assert_eq!(l.flag_reasons.len(), 3);

		// Flagged is terminal: no further flags, no purchase
		let more = engine.flag(&ctx("u4"), &listing.id, "late".to_string()).await;
		assert!(matches!(more, Err(ExchangeError::Conflict(_))));
		let buy = engine.purchase(&ctx("buyer"), &listing.id).await;
		assert!(matches!(buy, Err(ExchangeError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_purchase_and_confirm_payment_handshake() {
		let (engine, _) = engine();
		let seller = ctx("seller");
		let buyer = ctx("buyer");
		let listing = engine.create_listing(&seller, request(50_000)).await.unwrap();

		let own = engine.purchase(&seller, &listing.id).await;
		assert!(matches!(own, Err(ExchangeError::Forbidden(_))));

		let sold = engine.purchase(&buyer, &listing.id).await.unwrap();
		assert_eq!(sold.status, ListingStatus::Sold);
		assert_eq!(sold.buyer_id.as_deref(), Some("buyer"));

		// Still hidden from the buyer until the seller confirms
		let view = ListingResponse::for_viewer(sold.clone(), "buyer");
		assert!(view.code_value.is_none());

		// Second buyer is turned away with a conflict
		let late = engine.purchase(&ctx("buyer2"), &listing.id).await;
		assert!(matches!(late, Err(ExchangeError::Conflict(_))));

		// Only the seller may confirm
		let not_seller = engine.confirm_payment(&buyer, &listing.id).await;
		assert!(matches!(not_seller, Err(ExchangeError::Forbidden(_))));

		let confirmed = engine.confirm_payment(&seller, &listing.id).await.unwrap();
		let confirmed_at = confirmed.payment_confirmed_at.unwrap();
		let view = ListingResponse::for_viewer(confirmed.clone(), "buyer");
		assert_eq!(view.code_value.as_deref(), Some("SECRET-CODE"));

		// Confirming again never rewrites the timestamp
		let again = engine.confirm_payment(&seller, &listing.id).await.unwrap();
		assert_eq!(again.payment_confirmed_at, Some(confirmed_at));
	}

	#[tokio::test]
	async fn test_confirm_payment_requires_pending_purchase() {
		let (engine, _) = engine();
		let seller = ctx("seller");
		let listing = engine.create_listing(&seller, request(1000)).await.unwrap();

		let premature = engine.confirm_payment(&seller, &listing.id).await;
		assert!(matches!(premature, Err(ExchangeError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_cancel_rules() {
		let (engine, _) = engine();
		let seller = ctx("seller");
		let buyer = ctx("buyer");
		let listing = engine.create_listing(&seller, request(1000)).await.unwrap();

		let not_seller = engine.cancel(&buyer, &listing.id).await;
		assert!(matches!(not_seller, Err(ExchangeError::Forbidden(_))));

		engine.purchase(&buyer, &listing.id).await.unwrap();

		// Cancelling a sold listing is not a modeled operation
		let sold = engine.cancel(&seller, &listing.id).await;
		assert!(matches!(sold, Err(ExchangeError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_cancel_active_listing() {
		let (engine, _) = engine();
		let seller = ctx("seller");
		let listing = engine.create_listing(&seller, request(1000)).await.unwrap();

		let cancelled = engine.cancel(&seller, &listing.id).await.unwrap();
		assert_eq!(cancelled.status, ListingStatus::Cancelled);

		let buy = engine.purchase(&ctx("buyer"), &listing.id).await;
		assert!(matches!(buy, Err(ExchangeError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_lazy_expiry_filters_and_persists() {
		let (engine, storage) = engine();
		plant(&storage, &lapsed_listing("stale", "seller")).await;

		// The active feed never shows a lapsed listing, even though its
		// stored status still says active.
		let active = engine.list_active().await.unwrap();
		assert!(active.is_empty());

		// A purchase attempt is rejected
		let buy = engine.purchase(&ctx("buyer"), "stale").await;
		assert!(matches!(buy, Err(ExchangeError::Conflict(_))));

		// A direct read flips and persists the stored status
		let listing = engine.get_listing("stale").await.unwrap();
		assert_eq!(listing.status, ListingStatus::Expired);
		let (stored, _): (ExchangeListing, Vec<u8>) = storage
			.retrieve_raw(StorageKey::Listings.as_str(), "stale")
			.await
			.unwrap();
		assert_eq!(stored.status, ListingStatus::Expired);
	}

	#[tokio::test]
	async fn test_explicit_expire_action() {
		let (engine, storage) = engine();
		plant(&storage, &lapsed_listing("stale", "seller")).await;

		let expired = engine.expire("stale").await.unwrap();
		assert_eq!(expired.status, ListingStatus::Expired);

		// Idempotent on an already-expired listing
		let again = engine.expire("stale").await.unwrap();
		assert_eq!(again.status, ListingStatus::Expired);

		// A live listing cannot be expired early
		let seller = ctx("seller2");
		let live = engine.create_listing(&seller, request(1000)).await.unwrap();
		let early = engine.expire(&live.id).await;
		assert!(matches!(early, Err(ExchangeError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_buyer_and_seller_feeds() {
		let (engine, _) = engine();
		let seller = ctx("seller");
		let buyer = ctx("buyer");
		let listing = engine.create_listing(&seller, request(1000)).await.unwrap();
		engine.purchase(&buyer, &listing.id).await.unwrap();

		let sold = engine.list_for_seller(&seller).await.unwrap();
		assert_eq!(sold.len(), 1);

		let bought = engine.list_for_buyer(&buyer).await.unwrap();
		assert_eq!(bought.len(), 1);
		assert_eq!(bought[0].id, listing.id);

		assert!(engine.list_for_buyer(&ctx("other")).await.unwrap().is_empty());
	}
}
