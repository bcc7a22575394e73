//! Recurrence projector

use chrono::{Days, Months, NaiveDate};

use super::classify::Frequency;

/// Next expected occurrence after `last`
///
/// Month steps clamp to the end of the target month (Jan 31 → Feb 28/29).
/// Unknown frequencies fall back to one month.
pub fn project_next(last: NaiveDate, frequency: Frequency) -> NaiveDate {
    let next = match frequency {
        Frequency::Weekly => last.checked_add_days(Days::new(7)),
        Frequency::Biweekly => last.checked_add_days(Days::new(14)),
        Frequency::Monthly | Frequency::Unknown => last.checked_add_months(Months::new(1)),
        Frequency::Quarterly => last.checked_add_months(Months::new(3)),
        Frequency::Annually => last.checked_add_months(Months::new(12)),
    };
    // Only reachable at the very end of chrono's date range
    next.unwrap_or(last)
}
