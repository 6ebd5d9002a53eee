use log::debug;

use crate::models::{BuildRecord, BuildResult};
use crate::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum MetricKind {
    /// Mean time to repair: failure followed by success.
    Mttr,
    /// Mean time to failure: success followed by failure.
    Mttf,
}

impl MetricKind {
    pub const ALL: [MetricKind; 2] = [MetricKind::Mttr, MetricKind::Mttf];

    /// The result that opens an interval and the one that closes it.
    fn transition(self) -> (BuildResult, BuildResult) {
        match self {
            MetricKind::Mttr => (BuildResult::Failure, BuildResult::Success),
            MetricKind::Mttf => (BuildResult::Success, BuildResult::Failure),
        }
    }
}

/// A single computed value for one kind over one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateMetric {
    pub kind: MetricKind,
    pub window: Window,
    pub value_ms: u64,
}

/// Mean interval in milliseconds between each opening result and the next
/// closing result, in start-time order.
///
/// Only the most recent opening record before a closing one counts. Results
/// other than SUCCESS and FAILURE are skipped without resetting a pending
/// interval. Returns 0 when no transition exists.
#[allow(clippy::cast_possible_truncation)]
pub fn aggregate(records: &[BuildRecord], kind: MetricKind) -> u64 {
    let intervals = transition_intervals(records, kind);

    if intervals.is_empty() {
        debug!(
            "No {kind:?} transitions among {} records, reporting 0",
            records.len()
        );
        return 0;
    }

    let total: u128 = intervals.iter().map(|&i| u128::from(i)).sum();
    (total / intervals.len() as u128) as u64
}

fn transition_intervals(records: &[BuildRecord], kind: MetricKind) -> Vec<u64> {
    let (opening, closing) = kind.transition();

    let mut sorted: Vec<&BuildRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.start_time);

    let mut pending: Option<i64> = None;
    let mut intervals = Vec::new();

    for record in sorted {
        if record.result == opening {
            pending = Some(record.start_time);
        } else if record.result == closing {
            if let Some(opened_at) = pending.take() {
                #[allow(clippy::cast_sign_loss)]
                intervals.push(record.start_time.saturating_sub(opened_at) as u64);
            }
        }
    }

    intervals
}

/// Computes MTTR and MTTF for every window against one `now`.
pub fn aggregate_windows(records: &[BuildRecord], now: i64) -> Vec<AggregateMetric> {
    MetricKind::ALL
        .iter()
        .flat_map(|&kind| {
            Window::ALL.iter().map(move |&window| {
                let selected = window.select(records, now);
                AggregateMetric {
                    kind,
                    window,
                    value_ms: aggregate(&selected, kind),
                }
            })
        })
        .collect()
}
