//! Wall-clock trigger arithmetic for the daily sweep.

use chrono::{DateTime, Days, FixedOffset, NaiveTime, TimeZone, Utc};

/// Daily wall-clock trigger (hour and minute in the scheduler's offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerTime {
    /// Hour of day (0-23).
    pub hour: u8,
    /// Minute of hour (0-59).
    pub min: u8,
}

impl std::fmt::Display for TriggerTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "daily at {:02}:{:02}", self.hour, self.min)
    }
}

impl TriggerTime {
    /// Returns `None` when hour or minute is out of range.
    #[must_use]
    pub fn new(hour: u8, min: u8) -> Option<Self> {
        (hour < 24 && min < 60).then_some(Self { hour, min })
    }

    fn time_of_day(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.min), 0)
            .unwrap_or(NaiveTime::MIN)
    }

    /// Next trigger instant strictly after `now`: today's trigger if it is
    /// still ahead, otherwise tomorrow's.
    #[must_use]
    pub fn next_after(self, now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
        let local = now.with_timezone(&offset);
        let today = local.date_naive();
        let day = if local.time() < self.time_of_day() {
            today
        } else {
            today.checked_add_days(Days::new(1)).unwrap_or(today)
        };
        offset
            .from_local_datetime(&day.and_time(self.time_of_day()))
            .single()
            .map_or(now, |at| at.with_timezone(&Utc))
    }
}

/// How long to sleep from `now` until the next trigger.
///
/// Recomputed every cycle so clock changes and restarts self-correct.
#[must_use]
pub fn duration_until_next_trigger(
    now: DateTime<Utc>,
    trigger: TriggerTime,
    offset: FixedOffset,
) -> std::time::Duration {
    (trigger.next_after(now, offset) - now)
        .to_std()
        .unwrap_or_default()
}
