use log::{debug, info};

use crate::aggregate::MetricKind;
use crate::metric_store::{self, MetricKey};
use crate::models::Project;
use crate::window::Window;

/// Shown in place of a single value that cannot be read.
pub const UNAVAILABLE: &str = "N/A";

/// Shown instead of the summary when the store cannot be read at all.
pub const NO_DATA: &str = "Unable to get result";

const SECOND_MS: u64 = 1_000;
const MINUTE_MS: u64 = 60 * SECOND_MS;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;
const MONTH_MS: u64 = 30 * DAY_MS;
const YEAR_MS: u64 = 365 * DAY_MS;

/// Renders one stored value, or [`UNAVAILABLE`] when it cannot be read.
pub fn get_result(project: &Project, key: MetricKey) -> String {
    let value = metric_store::read(project).and_then(|values| values.value(key));

    match value {
        Ok(ms) => format_past_time(ms),
        Err(e) => {
            debug!("{key} unavailable for {}: {e}", project.name());
            UNAVAILABLE.to_string()
        }
    }
}

/// Renders one line per window for `kind`, or a single [`NO_DATA`] line.
pub fn get_show_result(project: &Project, kind: MetricKind) -> Vec<String> {
    let values = match metric_store::read(project) {
        Ok(values) => values,
        Err(e) => {
            info!("No metrics to show for {}: {e}", project.name());
            return vec![NO_DATA.to_string()];
        }
    };

    Window::ALL
        .iter()
        .map(|&window| {
            let rendered = values
                .get(MetricKey::new(kind, window))
                .map_or_else(|| UNAVAILABLE.to_string(), format_past_time);
            format!("{}: {rendered}", window.label())
        })
        .collect()
}

pub fn format_past_time(ms: u64) -> String {
    format!("{} ago", format_time_span(ms))
}

/// Human readable span using the two most significant units, e.g.
/// `"3 days 4 hr"`. The smaller unit is dropped once the larger reaches 10.
pub fn format_time_span(ms: u64) -> String {
    let years = ms / YEAR_MS;
    let rest = ms % YEAR_MS;
    let months = rest / MONTH_MS;
    let rest = rest % MONTH_MS;
    let days = rest / DAY_MS;
    let rest = rest % DAY_MS;
    let hours = rest / HOUR_MS;
    let rest = rest % HOUR_MS;
    let minutes = rest / MINUTE_MS;
    let rest = rest % MINUTE_MS;
    let seconds = rest / SECOND_MS;
    let millis = rest % SECOND_MS;

    if years > 0 {
        two_units((years, "yr", "yr"), (months, "mo", "mo"))
    } else if months > 0 {
        two_units((months, "mo", "mo"), (days, "day", "days"))
    } else if days > 0 {
        two_units((days, "day", "days"), (hours, "hr", "hr"))
    } else if hours > 0 {
        two_units((hours, "hr", "hr"), (minutes, "min", "min"))
    } else if minutes > 0 {
        two_units((minutes, "min", "min"), (seconds, "sec", "sec"))
    } else if seconds >= 10 {
        format!("{seconds} sec")
    } else if seconds >= 1 {
        format!("{seconds}.{} sec", millis / 100)
    } else {
        format!("{millis} ms")
    }
}

fn unit((count, singular, plural): (u64, &str, &str)) -> String {
    let label = if count == 1 { singular } else { plural };
    format!("{count} {label}")
}

fn two_units(big: (u64, &str, &str), small: (u64, &str, &str)) -> String {
    if big.0 < 10 && small.0 > 0 {
        format!("{} {}", unit(big), unit(small))
    } else {
        unit(big)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric_store::MetricSet;
    use std::fs;

    fn project(dir: &tempfile::TempDir) -> Project {
        Project::new(dir.path(), "app").unwrap()
    }

    #[test]
    fn test_format_time_span_units() {
        assert_eq!(format_time_span(0), "0 ms");
        assert_eq!(format_time_span(250), "250 ms");
        assert_eq!(format_time_span(1_500), "1.5 sec");
        assert_eq!(format_time_span(42 * SECOND_MS), "42 sec");
        assert_eq!(format_time_span(5 * MINUTE_MS + 2 * SECOND_MS), "5 min 2 sec");
        assert_eq!(format_time_span(HOUR_MS), "1 hr");
        assert_eq!(format_time_span(3 * DAY_MS + 4 * HOUR_MS), "3 days 4 hr");
        assert_eq!(format_time_span(DAY_MS + HOUR_MS), "1 day 1 hr");
        assert_eq!(format_time_span(12 * HOUR_MS + 30 * MINUTE_MS), "12 hr");
        assert_eq!(format_time_span(2 * MONTH_MS + DAY_MS), "2 mo 1 day");
        assert_eq!(format_time_span(YEAR_MS + 3 * MONTH_MS), "1 yr 3 mo");
    }

    #[test]
    fn test_format_past_time_appends_ago() {
        assert_eq!(format_past_time(3 * DAY_MS + 4 * HOUR_MS), "3 days 4 hr ago");
    }

    #[test]
    fn test_get_result_formats_stored_value() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(&dir);
        let mut values = MetricSet::new();
        values.insert(MetricKey::MttrLast7Days, 2 * HOUR_MS);
        metric_store::store(&project, &values).unwrap();

        assert_eq!(get_result(&project, MetricKey::MttrLast7Days), "2 hr ago");
        assert_eq!(get_result(&project, MetricKey::MttfLast7Days), UNAVAILABLE);
    }

    #[test]
    fn test_get_result_without_store_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(get_result(&project(&dir), MetricKey::MttrAllBuilds), UNAVAILABLE);
    }

    #[test]
    fn test_get_show_result_without_store_returns_single_sentinel() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(
            get_show_result(&project(&dir), MetricKind::Mttr),
            vec![NO_DATA.to_string()]
        );
    }

    #[test]
    fn test_get_show_result_with_unreadable_store_returns_single_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(&dir);
        fs::create_dir_all(project.root_dir()).unwrap();
        fs::write(project.metrics_path(), "garbage").unwrap();

        assert_eq!(get_show_result(&project, MetricKind::Mttf), vec![NO_DATA]);
    }

    #[test]
    fn test_get_show_result_renders_three_windows() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(&dir);
        let mut values = MetricSet::new();
        values.insert(MetricKey::MttfLast7Days, 0);
        values.insert(MetricKey::MttfAllBuilds, 3 * DAY_MS + 4 * HOUR_MS);
        metric_store::store(&project, &values).unwrap();

        let lines = get_show_result(&project, MetricKind::Mttf);

        assert_eq!(
            lines,
            vec![
                "Last 7 days: 0 ms ago",
                "Last 30 days: N/A",
                "All builds: 3 days 4 hr ago",
            ]
        );
    }
}
