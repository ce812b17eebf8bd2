//! Surrogate key generation
//!
//! Every row the collector creates gets an id built from the wall clock
//! (microseconds, scaled by 1000) plus a random offset below 1000. The result
//! fits comfortably in an `i64` until the year 2262.
//!
//! Two callers landing in the same microsecond with the same random offset
//! would collide, so the generator also keeps a process-wide high-water mark:
//! a candidate that is not above the last handed-out id is bumped to
//! `last + 1`. This keeps batches generated in a tight loop unique without
//! any locking.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rand::Rng;

/// Width of the random offset added to the scaled timestamp
const RANDOM_SPAN: i64 = 1000;

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Produce a new surrogate key
pub fn next_id() -> i64 {
    let candidate = candidate_id();

    let previous = LAST_ID
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(if candidate > last { candidate } else { last + 1 })
        })
        .unwrap_or_else(|last| last);

    if candidate > previous {
        candidate
    } else {
        previous + 1
    }
}

/// Generate `count` ids at once (used for batched inserts)
pub fn next_ids(count: usize) -> Vec<i64> {
    (0..count).map(|_| next_id()).collect()
}

fn candidate_id() -> i64 {
    let micros = Utc::now().timestamp_micros();
    let offset = rand::thread_rng().gen_range(0..RANDOM_SPAN);
    micros.saturating_mul(RANDOM_SPAN).saturating_add(offset)
}
