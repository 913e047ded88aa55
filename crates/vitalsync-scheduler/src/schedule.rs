use chrono::{DateTime, TimeZone};
use vitalsync_core::ScheduleSpec;

/// Next instant, strictly after `from`, at which a daily `spec` fires in
/// `from`'s time zone.
///
/// A wall-clock time that does not exist on a given day (DST gap) is skipped
/// to the following day.
pub fn compute_next_run<Tz: TimeZone>(spec: &ScheduleSpec, from: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = from.timezone();
    let mut day = from.date_naive();
    for _ in 0..3 {
        let naive = day.and_hms_opt(spec.hour.into(), spec.minute.into(), 0)?;
        if let Some(candidate) = tz.from_local_datetime(&naive).earliest() {
            if candidate > *from {
                return Some(candidate);
            }
        }
        day = day.succ_opt()?;
    }
    None
}
