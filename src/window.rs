use crate::models::BuildRecord;

pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Trailing time spans metrics are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    Last7Days,
    Last30Days,
    AllBuilds,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Last7Days, Window::Last30Days, Window::AllBuilds];

    /// Window length in days; `0` means unbounded.
    pub fn days(self) -> u32 {
        match self {
            Window::Last7Days => 7,
            Window::Last30Days => 30,
            Window::AllBuilds => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Window::Last7Days => "Last 7 days",
            Window::Last30Days => "Last 30 days",
            Window::AllBuilds => "All builds",
        }
    }

    pub fn select(self, records: &[BuildRecord], now: i64) -> Vec<BuildRecord> {
        filter(records, self.days(), now)
    }
}

/// Keeps records that started within the last `window_days` before `now`.
///
/// `window_days == 0` disables filtering. The cutoff is inclusive.
pub fn filter(records: &[BuildRecord], window_days: u32, now: i64) -> Vec<BuildRecord> {
    if window_days == 0 {
        return records.to_vec();
    }

    let cutoff = now.saturating_sub(i64::from(window_days) * MILLIS_PER_DAY);
    records
        .iter()
        .filter(|r| r.start_time >= cutoff)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BuildResult;

    const NOW: i64 = 100 * MILLIS_PER_DAY;

    fn days_ago(build_number: u64, days: i64) -> BuildRecord {
        BuildRecord::new(build_number, NOW - days * MILLIS_PER_DAY, 0, BuildResult::Success)
    }

    fn numbers(records: &[BuildRecord]) -> Vec<u64> {
        records.iter().map(|r| r.build_number).collect()
    }

    #[test]
    fn test_zero_days_returns_input_unchanged() {
        let records = vec![days_ago(1, 90), days_ago(2, 1), days_ago(3, 45)];

        assert_eq!(filter(&records, 0, NOW), records);
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let exact = BuildRecord::new(1, NOW - 7 * MILLIS_PER_DAY, 0, BuildResult::Failure);
        let just_outside =
            BuildRecord::new(2, NOW - 7 * MILLIS_PER_DAY - 1, 0, BuildResult::Failure);

        let kept = filter(&[exact.clone(), just_outside], 7, NOW);

        assert_eq!(kept, vec![exact]);
    }

    #[test]
    fn test_windows_are_nested_for_fixed_now() {
        let records = vec![
            days_ago(1, 60),
            days_ago(2, 29),
            days_ago(3, 3),
            days_ago(4, 10),
            days_ago(5, 0),
            days_ago(6, 31),
        ];

        let week = Window::Last7Days.select(&records, NOW);
        let month = Window::Last30Days.select(&records, NOW);
        let all = Window::AllBuilds.select(&records, NOW);

        assert_eq!(numbers(&week), vec![3, 5]);
        assert_eq!(numbers(&month), vec![2, 3, 4, 5]);
        assert_eq!(all.len(), records.len());
        assert!(week.iter().all(|r| month.contains(r)));
        assert!(month.iter().all(|r| all.contains(r)));
    }

    #[test]
    fn test_filter_preserves_log_order() {
        let records = vec![days_ago(9, 1), days_ago(4, 5), days_ago(6, 2)];

        assert_eq!(numbers(&filter(&records, 7, NOW)), vec![9, 4, 6]);
    }
}
