//! Delivery-time computation.
//!
//! `send = now + delay_hours`, then optionally pushed into business hours.
//! This is a best-effort policy: no weekend or holiday calendar.

use chrono::{DateTime, Duration, FixedOffset, Offset, TimeZone, Timelike, Utc};

use crate::followup::rule::ScheduleConfig;

/// Business-hours window used when a rule asks for `business_hours_only`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    /// First hour inside the window (inclusive).
    pub start_hour: u32,
    /// First hour outside the window (exclusive).
    pub end_hour: u32,
    /// Hour of the next day a send time is moved to.
    pub rollover_hour: u32,
    /// Timezone the window is evaluated in.
    pub utc_offset: FixedOffset,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 18,
            rollover_hour: 9,
            utc_offset: Utc.fix(),
        }
    }
}

impl BusinessHours {
    /// Default window evaluated at `utc_offset`.
    pub fn with_offset(utc_offset: FixedOffset) -> Self {
        Self {
            utc_offset,
            ..Self::default()
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let hour = at.with_timezone(&self.utc_offset).hour();
        (self.start_hour..self.end_hour).contains(&hour)
    }

    /// Move `at` to the rollover hour of the next calendar day when it falls
    /// outside the window; otherwise return it unchanged.
    pub fn adjust(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        if self.contains(at) {
            return at;
        }
        let local = at.with_timezone(&self.utc_offset);
        local
            .date_naive()
            .succ_opt()
            .and_then(|day| day.and_hms_opt(self.rollover_hour, 0, 0))
            .and_then(|naive| self.utc_offset.from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(at)
    }
}

/// Intended delivery time for a notification produced at `now`.
///
/// `None` when the delay pushes the send time past the representable range.
pub fn delivery_time(
    schedule: &ScheduleConfig,
    now: DateTime<Utc>,
    hours: &BusinessHours,
) -> Option<DateTime<Utc>> {
    let delay = Duration::hours(i64::from(schedule.delay_hours.unwrap_or(0)));
    let send_at = now.checked_add_signed(delay)?;
    if schedule.business_hours_only {
        Some(hours.adjust(send_at))
    } else {
        Some(send_at)
    }
}
