use chrono::NaiveDate;

/// Daily-streak transition applied once per recorded contribution.
///
/// A contribution on the day after the previous one extends the streak,
/// another contribution on the same day leaves it unchanged, and any
/// larger gap (or no history at all) resets it to one.
pub fn next_streak(last_contribution: Option<NaiveDate>, today: NaiveDate, current: u32) -> u32 {
    let Some(last) = last_contribution else {
        return 1;
    };

    match today.signed_duration_since(last).num_days() {
        1 => current + 1,
        0 => current,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::next_streak;

    fn day(year: i32, month: u32, dayn: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, dayn).unwrap()
    }

    #[test]
    fn consecutive_day_extends_the_streak() {
        assert_eq!(next_streak(Some(day(2025, 3, 1)), day(2025, 3, 2), 4), 5);
    }

    #[test]
    fn same_day_contribution_keeps_the_streak() {
        assert_eq!(next_streak(Some(day(2025, 3, 2)), day(2025, 3, 2), 4), 4);
    }

    #[test]
    fn gap_resets_the_streak_to_one() {
        assert_eq!(next_streak(Some(day(2025, 3, 1)), day(2025, 3, 4), 9), 1);
    }

    #[test]
    fn first_ever_contribution_starts_at_one() {
        assert_eq!(next_streak(None, day(2025, 3, 2), 0), 1);
    }

    #[test]
    fn backdated_contribution_counts_as_a_break() {
        // A last date in the future relative to "today" is a negative diff.
        assert_eq!(next_streak(Some(day(2025, 3, 5)), day(2025, 3, 2), 3), 1);
    }
}
