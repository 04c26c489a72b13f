//! Source of "today" for bucket building.
//!
//! The engine never reads the wall clock directly; services hold a
//! [`Clock`] so tests can pin the date.

use chrono::{FixedOffset, NaiveDate, Utc};

pub trait Clock: Send + Sync {
    /// The current local date at `offset`.
    fn today(&self, offset: FixedOffset) -> NaiveDate;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self, offset: FixedOffset) -> NaiveDate {
        Utc::now().with_timezone(&offset).date_naive()
    }
}

/// A clock pinned to one date, whatever the offset.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self, _offset: FixedOffset) -> NaiveDate {
        self.0
    }
}
