//! Posting-date window applied before records enter the public dataset.

use chrono::NaiveDate;

/// Inclusion range `[today - N days, today]` for posting dates.
///
/// An unbounded window admits everything, including records without a
/// parseable posting date. A bounded window excludes dateless records: an
/// undatable listing cannot be shown to be recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    days: Option<i64>,
}

impl DateWindow {
    pub fn days(n: u32) -> Self {
        Self {
            days: Some(i64::from(n)),
        }
    }

    pub fn unbounded() -> Self {
        Self { days: None }
    }

    /// Config convention inherited from the run options: `0` disables the
    /// window entirely.
    pub fn from_config(days: u32) -> Self {
        if days == 0 {
            Self::unbounded()
        } else {
            Self::days(days)
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.days.is_some()
    }

    pub fn contains(&self, posting_date: Option<NaiveDate>, today: NaiveDate) -> bool {
        let Some(max_days) = self.days else {
            return true;
        };
        let Some(date) = posting_date else {
            return false;
        };
        let age = today.signed_duration_since(date).num_days();
        (0..=max_days).contains(&age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case::today(Some((2025, 7, 31)), true)]
    #[case::oldest_included(Some((2025, 7, 1)), true)]
    #[case::one_day_too_old(Some((2025, 6, 30)), false)]
    #[case::future(Some((2025, 8, 1)), false)]
    #[case::missing_date(None, false)]
    fn bounded_window(#[case] posting: Option<(i32, u32, u32)>, #[case] included: bool) {
        let today = date(2025, 7, 31);
        let posting_date = posting.map(|(y, m, d)| date(y, m, d));
        assert_eq!(DateWindow::days(30).contains(posting_date, today), included);
    }

    #[test]
    fn unbounded_window_admits_missing_dates() {
        let today = date(2025, 7, 31);
        assert!(DateWindow::unbounded().contains(None, today));
        assert!(DateWindow::unbounded().contains(Some(date(2000, 1, 1)), today));
    }

    #[test]
    fn zero_config_means_unbounded() {
        assert!(!DateWindow::from_config(0).is_bounded());
        assert!(DateWindow::from_config(7).is_bounded());
    }
}
