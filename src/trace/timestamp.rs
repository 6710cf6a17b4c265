//! Wall-clock timestamps for trace lines
//!
//! Rendered in local time as `Mon DD HH:MM:SS uuuuuu`.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

/// A point in wall-clock time with microsecond resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
	/// Seconds since the Unix epoch
	pub secs: libc::time_t,
	/// Microseconds within the second
	pub micros: u32,
}

impl Timestamp {
	/// Capture the current wall-clock time
	#[must_use]
	pub fn now() -> Self {
		let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
		Self {
			secs: elapsed.as_secs() as libc::time_t,
			micros: elapsed.subsec_micros(),
		}
	}

	fn local_time(&self) -> Option<libc::tm> {
		// SAFETY: `tm` is plain old data and localtime_r only writes into it.
		let mut tm: libc::tm = unsafe { std::mem::zeroed() };
		let ret = unsafe { libc::localtime_r(&self.secs, &mut tm) };
		(!ret.is_null()).then_some(tm)
	}
}

impl fmt::Display for Timestamp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let tm = self.local_time();
		let month = tm
			.as_ref()
			.and_then(|tm| usize::try_from(tm.tm_mon).ok())
			.and_then(|mon| MONTHS.get(mon))
			.copied()
			.unwrap_or("???");
		let (day, hour, min, sec) = tm.map_or((0, 0, 0, 0), |tm| (tm.tm_mday, tm.tm_hour, tm.tm_min, tm.tm_sec));

		write!(f, "{month} {day:02} {hour:02}:{min:02}:{sec:02} {:06}", self.micros)
	}
}
