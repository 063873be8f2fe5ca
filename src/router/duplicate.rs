//! The router's duplicate-request cache (spec §4.8, §9: window duration is
//! undeclared upstream; this implementation uses 5 minutes — see
//! DESIGN.md).

// Uses
use std::{
	collections::HashMap,
	sync::Mutex,
	time::{Duration, Instant},
};

/// How long a `(stan, local_date)` pair is remembered after being seen.
pub const WINDOW: Duration = Duration::from_secs(5 * 60);

/// Tracks recently-seen `(STAN, local date)` pairs so an exact resend can be
/// answered with "94" instead of being reprocessed. A `Mutex` is sufficient
/// here: the router is the cache's sole owner and every check is a single
/// short critical section (spec §9: "accessed through ... the router via
/// the submit API").
pub struct DuplicateCache {
	seen: Mutex<HashMap<(String, String), Instant>>,
}

impl Default for DuplicateCache {
	fn default() -> Self {
		Self::new()
	}
}

impl DuplicateCache {
	#[must_use]
	pub fn new() -> Self {
		Self {
			seen: Mutex::new(HashMap::new()),
		}
	}

	/// Records `(stan, local_date)` and returns `true` if it was already
	/// present within [`WINDOW`] (expired entries are treated as new and
	/// evicted opportunistically).
	pub fn check_and_record(&self, stan: &str, local_date: &str) -> bool {
		let key = (stan.to_owned(), local_date.to_owned());
		let now = Instant::now();
		let mut seen = self.seen.lock().expect("duplicate cache mutex poisoned");
		seen.retain(|_, seen_at| now.duration_since(*seen_at) < WINDOW);
		let is_duplicate = seen.contains_key(&key);
		seen.insert(key, now);
		is_duplicate
	}
}
