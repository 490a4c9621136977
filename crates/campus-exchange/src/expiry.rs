//! Sales-deadline computation for exchange listings.
//!
//! Every listing expires at 14:00 local time: same day when created at or
//! before the cutoff, next day otherwise. There is no background timer;
//! the deadline is enforced lazily at read time by comparing `expires_at`
//! against the current clock.

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone};

/// Hour of day (local time) at which listings stop selling.
pub const SALES_CUTOFF_HOUR: u32 = 14;

/// Computes the sales deadline for a listing created at `now`.
///
/// Created at or before today's 14:00 cutoff: expires today at 14:00.
/// Created after the cutoff: expires tomorrow at 14:00.
pub fn compute_expires_at(now: DateTime<Local>) -> DateTime<Local> {
	let today_cutoff = cutoff_on(now.date_naive());
	if now > today_cutoff {
		cutoff_on(now.date_naive() + Duration::days(1))
	} else {
		today_cutoff
	}
}

/// Returns 14:00 local time on the given date.
fn cutoff_on(date: NaiveDate) -> DateTime<Local> {
	let time = NaiveTime::from_hms_opt(SALES_CUTOFF_HOUR, 0, 0).unwrap_or_default();
	let naive = date.and_time(time);
	match Local.from_local_datetime(&naive) {
		LocalResult::Single(dt) => dt,
		// DST fold: take the earlier instant
		LocalResult::Ambiguous(dt, _) => dt,
		// DST gap: interpret the naive time as UTC rather than panic
		LocalResult::None => Local.from_utc_datetime(&naive),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Timelike;

	fn at(hour: u32, minute: u32) -> DateTime<Local> {
		let date = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
		let naive = date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap());
		Local.from_local_datetime(&naive).unwrap()
	}

	#[test]
	fn test_before_cutoff_expires_same_day() {
		let expires = compute_expires_at(at(13, 0));
		assert_eq!(expires.date_naive(), at(13, 0).date_naive());
		assert_eq!(expires.hour(), 14);
		assert_eq!(expires.minute(), 0);
	}

	#[test]
	fn test_after_cutoff_expires_next_day() {
		let created = at(15, 0);
		let expires = compute_expires_at(created);
		assert_eq!(
			expires.date_naive(),
			created.date_naive() + Duration::days(1)
		);
		assert_eq!(expires.hour(), 14);
	}

	#[test]
	fn test_exactly_at_cutoff_expires_same_day() {
		let created = at(14, 0);
		let expires = compute_expires_at(created);
		assert_eq!(expires, created);
	}

	#[test]
	fn test_deadline_is_always_in_the_future_or_now() {
		for hour in 0..24 {
			let created = at(hour, 30);
			assert!(compute_expires_at(created) >= created);
		}
	}
}
