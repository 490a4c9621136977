//! Exchange listing types for the peer-to-peer code marketplace.
//!
//! This module defines the listing document stored by the persistence
//! collaborator, the listing lifecycle status, and the moderation and
//! pricing constants enforced by the exchange lifecycle engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum allowed listing price in currency units.
pub const MAX_LISTING_PRICE: u32 = 60_000;

/// Number of flags that forces a listing into `Flagged` status.
pub const FLAG_HIDE_THRESHOLD: u32 = 3;

/// A peer-to-peer offer to sell a discount/voucher code.
///
/// The `code_value` field is the secret being sold. It must never be exposed
/// to any party other than the seller until the seller has confirmed payment,
/// at which point it becomes visible to the buyer only. Redaction happens at
/// the API boundary via [`crate::ListingResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeListing {
	/// Server-assigned unique identifier.
	pub id: String,
	/// Unix timestamp (seconds) when this listing was created. Immutable.
	pub created_at: i64,
	/// Identifier of the seller.
	pub user_id: String,
	/// Seller display name.
	pub user_name: String,
	/// Payment destination shown to the buyer.
	pub user_card_number: String,
	/// Short name of the code being sold.
	pub item_name: String,
	/// Free-text description.
	pub description: String,
	/// Asking price in currency units. Bounded by [`MAX_LISTING_PRICE`],
	/// immutable after creation.
	pub price: u32,
	/// The secret code being sold.
	pub code_value: String,
	/// Current lifecycle status.
	pub status: ListingStatus,
	/// Identifier of the buyer, set when a purchase is initiated.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub buyer_id: Option<String>,
	/// Number of times this listing has been flagged. Append-only.
	pub flag_count: u32,
	/// Free-text flag reasons in the order they were submitted.
	#[serde(default)]
	pub flag_reasons: Vec<String>,
	/// Unix timestamp of the 14:00 local-time sales deadline.
	pub expires_at: i64,
	/// Unix timestamp set when the seller confirmed off-platform payment.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub payment_confirmed_at: Option<i64>,
}

impl ExchangeListing {
	/// Returns true if the stored status is `Active` but the sales
	/// deadline has already passed. Expiry is enforced lazily at read
	/// time, so a stored status can be stale.
	pub fn is_lapsed(&self, now: i64) -> bool {
		self.status == ListingStatus::Active && self.expires_at < now
	}

	/// Returns true if `viewer_id` is allowed to see `code_value`.
	///
	/// The seller always may; the buyer only once payment has been
	/// confirmed; everyone else never.
	pub fn code_visible_to(&self, viewer_id: &str) -> bool {
		if self.user_id == viewer_id {
			return true;
		}
		self.payment_confirmed_at.is_some() && self.buyer_id.as_deref() == Some(viewer_id)
	}
}

/// Status of a listing in the exchange lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
	/// Listed and available for purchase.
	Active,
	/// A buyer has claimed the listing. Completion is distinguished by
	/// the presence of `payment_confirmed_at` on the document.
	Sold,
	/// Withdrawn by the seller. Terminal.
	Cancelled,
	/// Hidden by the flag threshold. Terminal; there is no un-flag path.
	Flagged,
	/// The 14:00 deadline passed without a sale. Terminal.
	Expired,
}

impl fmt::Display for ListingStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ListingStatus::Active => write!(f, "active"),
			ListingStatus::Sold => write!(f, "sold"),
			ListingStatus::Cancelled => write!(f, "cancelled"),
			ListingStatus::Flagged => write!(f, "flagged"),
			ListingStatus::Expired => write!(f, "expired"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn listing() -> ExchangeListing {
		ExchangeListing {
			id: "l-1".to_string(),
			created_at: 1_700_000_000,
			user_id: "seller".to_string(),
			user_name: "Seller".to_string(),
			user_card_number: "1234-5678".to_string(),
			item_name: "coffee voucher".to_string(),
			description: "10% off".to_string(),
			price: 50_000,
			code_value: "SECRET-CODE".to_string(),
			status: ListingStatus::Active,
			buyer_id: None,
			flag_count: 0,
			flag_reasons: Vec::new(),
			expires_at: 1_700_010_000,
			payment_confirmed_at: None,
		}
	}

	#[test]
	fn test_code_visibility_seller_only_before_confirmation() {
		let mut l = listing();
		l.status = ListingStatus::Sold;
		l.buyer_id = Some("buyer".to_string());

		assert!(l.code_visible_to("seller"));
		assert!(!l.code_visible_to("buyer"));
		assert!(!l.code_visible_to("bystander"));

		l.payment_confirmed_at = Some(1_700_001_000);
		assert!(l.code_visible_to("buyer"));
		assert!(!l.code_visible_to("bystander"));
	}

	#[test]
	fn test_lapsed_only_while_active() {
		let mut l = listing();
		assert!(l.is_lapsed(l.expires_at + 1));
		assert!(!l.is_lapsed(l.expires_at - 1));

		l.status = ListingStatus::Sold;
		assert!(!l.is_lapsed(l.expires_at + 1));
	}
}
