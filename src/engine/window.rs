use chrono::NaiveTime;

use crate::models::territory::{Schedule, Weekday};

/// Whether a weekly operating window covers the given instant.
///
/// A window with `start <= end` covers `start..=end` on each allowed day. A
/// window with `start > end` wraps past midnight and covers `time >= start`
/// or `time <= end`; both halves are tested against the same day's
/// allowed-day set, so the early-morning tail of a wrapping window belongs
/// to the day it falls on, not the day the shift started.
pub fn is_in_window(
    day: Weekday,
    time: NaiveTime,
    days: &[Weekday],
    start: NaiveTime,
    end: NaiveTime,
) -> bool {
    if !days.contains(&day) {
        return false;
    }

    if start <= end {
        start <= time && time <= end
    } else {
        time >= start || time <= end
    }
}

pub fn covers(schedule: &Schedule, day: Weekday, time: NaiveTime) -> bool {
    is_in_window(day, time, &schedule.days, schedule.start, schedule.end)
}
