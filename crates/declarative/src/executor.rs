//! Execution engine - runs planned operations with parallelism
//!
//! Each operation reconciles one resource. Failures are isolated: one
//! failing operation never stops or rolls back the others.

use crate::context::{ConfirmCallback, ProgressCallback};
use crate::error::Error;
use crate::planner::Change;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::Result;
use rayon::prelude::*;

/// One unit of work produced from a planned change
pub trait Operation: Send + Sync {
    /// What a successful run yields
    type Output: Send;

    /// Address of the resource being reconciled
    fn address(&self) -> &str;

    /// Planned change
    fn change(&self) -> Change;

    /// Run the operation against the remote service
    fn run(&self) -> crate::Result<Self::Output>;
}

/// A boxed operation for type-erased storage
pub type BoxedOperation<'a, T> = Box<dyn Operation<Output = T> + 'a>;

/// How a single operation ended
#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation ran and succeeded
    Applied(T),
    /// The operation did not run
    Skipped { reason: String },
    /// The operation ran and failed
    Failed(Error),
}

impl<T> Outcome<T> {
    /// Summarize for progress reporting
    pub fn to_result(&self, change: Change) -> ApplyResult {
        match self {
            Self::Applied(_) => ApplyResult::for_change(change),
            Self::Skipped { reason } => ApplyResult::Skipped {
                reason: reason.clone(),
            },
            Self::Failed(e) => ApplyResult::Failed {
                error: e.to_string(),
            },
        }
    }
}

/// Report for one operation
#[derive(Debug)]
pub struct OperationReport<T> {
    pub address: String,
    pub change: Change,
    pub outcome: Outcome<T>,
}

/// Reports in execution order, plus their summary
#[derive(Debug)]
pub struct Execution<T> {
    pub reports: Vec<OperationReport<T>>,
    pub summary: ExecuteSummary,
}

impl<T: Send> Execution<T> {
    fn skipped(ops: &[BoxedOperation<'_, T>], reason: &str) -> Self {
        let reports: Vec<_> = ops
            .iter()
            .map(|op| OperationReport {
                address: op.address().to_string(),
                change: op.change(),
                outcome: Outcome::Skipped {
                    reason: reason.to_string(),
                },
            })
            .collect();
        let summary = ExecuteSummary {
            skipped: reports.len(),
            ..Default::default()
        };
        Self { reports, summary }
    }
}

/// Execute operations with the given options and callbacks
///
/// # Arguments
/// * `ops` - Operations to run, in plan order
/// * `opts` - Execution options (dry_run, jobs)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
pub fn execute<T, P, C>(
    ops: &[BoxedOperation<'_, T>],
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<Execution<T>>
where
    T: Send,
    P: ProgressCallback,
    C: ConfirmCallback,
{
    if ops.is_empty() {
        return Ok(Execution {
            reports: Vec::new(),
            summary: ExecuteSummary::default(),
        });
    }

    if opts.dry_run {
        return Ok(Execution::skipped(ops, "Dry run"));
    }

    let prompt = format!("Apply {} change(s)?", ops.len());
    if !confirm.confirm(&prompt)? {
        return Ok(Execution::skipped(ops, "Declined"));
    }

    progress.on_start(ops.len());

    let reports = execute_phases(ops, opts.jobs)?;

    let mut summary = ExecuteSummary::default();
    for report in &reports {
        let result = report.outcome.to_result(report.change);
        progress.on_operation_complete(&report.address, &result);
        summary.add_result(&result);
    }
    progress.on_finish();

    Ok(Execution { reports, summary })
}

/// Execute operations phase by phase (see [`Change::phase`])
///
/// Each phase runs to completion before the next starts, so a create never
/// races the delete that frees its identity. Within a phase operations run
/// in input order, on a rayon pool when `jobs > 1`. Progress is reported
/// afterwards because callbacks are not thread-safe.
fn execute_phases<T: Send>(
    ops: &[BoxedOperation<'_, T>],
    jobs: usize,
) -> Result<Vec<OperationReport<T>>> {
    let pool = if jobs > 1 && ops.len() > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;
        Some(pool)
    } else {
        None
    };

    let mut phases: Vec<u8> = ops.iter().map(|op| op.change().phase()).collect();
    phases.sort_unstable();
    phases.dedup();

    let mut reports = Vec::with_capacity(ops.len());
    for phase in phases {
        let batch: Vec<&(dyn Operation<Output = T> + '_)> = ops
            .iter()
            .filter(|op| op.change().phase() == phase)
            .map(|op| op.as_ref())
            .collect();
        log::debug!("Phase {phase}: {} operation(s)", batch.len());

        match &pool {
            Some(pool) if batch.len() > 1 => {
                let done: Vec<_> =
                    pool.install(|| batch.par_iter().map(|op| run_operation(*op)).collect());
                reports.extend(done);
            }
            _ => reports.extend(batch.into_iter().map(|op| run_operation(op))),
        }
    }
    Ok(reports)
}

/// Run a single operation, capturing its failure
fn run_operation<T: Send>(op: &(dyn Operation<Output = T> + '_)) -> OperationReport<T> {
    log::debug!("{} {}", op.change(), op.address());
    let outcome = match op.run() {
        Ok(output) => Outcome::Applied(output),
        Err(e) => {
            log::debug!("{} failed: {}", op.address(), e);
            Outcome::Failed(e)
        }
    };
    OperationReport {
        address: op.address().to_string(),
        change: op.change(),
        outcome,
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple<T: Send>(
    ops: &[BoxedOperation<'_, T>],
    opts: &ExecuteOptions,
) -> Result<Execution<T>> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(ops, opts, &mut NoProgress, &mut AutoConfirm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct TestOperation<'a> {
        address: String,
        change: Change,
        fail: bool,
        runs: &'a AtomicUsize,
    }

    impl Operation for TestOperation<'_> {
        type Output = String;

        fn address(&self) -> &str {
            &self.address
        }

        fn change(&self) -> Change {
            self.change
        }

        fn run(&self) -> crate::Result<String> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::gone("test", &self.address))
            } else {
                Ok(self.address.clone())
            }
        }
    }

    fn ops<'a>(
        runs: &'a AtomicUsize,
        steps: &[(&str, Change, bool)],
    ) -> Vec<BoxedOperation<'a, String>> {
        steps
            .iter()
            .map(|(address, change, fail)| {
                Box::new(TestOperation {
                    address: (*address).to_string(),
                    change: *change,
                    fail: *fail,
                    runs,
                }) as BoxedOperation<'a, String>
            })
            .collect()
    }

    /// Logs when it starts and ends; deletes and replacements are slow
    struct TimedOperation<'a> {
        address: String,
        change: Change,
        events: &'a Mutex<Vec<String>>,
    }

    impl Operation for TimedOperation<'_> {
        type Output = ();

        fn address(&self) -> &str {
            &self.address
        }

        fn change(&self) -> Change {
            self.change
        }

        fn run(&self) -> crate::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("start {}", self.address));
            if matches!(self.change, Change::Delete | Change::Replace) {
                std::thread::sleep(Duration::from_millis(100));
            }
            self.events
                .lock()
                .unwrap()
                .push(format!("end {}", self.address));
            Ok(())
        }
    }

    #[test]
    fn test_execute_empty() {
        let result = execute_simple::<String>(&[], &ExecuteOptions::default()).unwrap();
        assert_eq!(result.summary.total(), 0);
        assert!(result.reports.is_empty());
    }

    #[test]
    fn test_execute_counts_changes() {
        let runs = AtomicUsize::new(0);
        let ops = ops(
            &runs,
            &[
                ("test.a", Change::Delete, false),
                ("test.b", Change::Create, false),
                ("test.c", Change::Refresh, false),
                ("test.d", Change::Replace, false),
            ],
        );

        let result = execute_simple(&ops, &ExecuteOptions::default()).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 4);
        assert_eq!(result.summary.deleted, 1);
        assert_eq!(result.summary.created, 1);
        assert_eq!(result.summary.refreshed, 1);
        assert_eq!(result.summary.replaced, 1);

        // Deletes, then replacements, then the rest in input order
        let addresses: Vec<_> = result.reports.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(addresses, ["test.a", "test.d", "test.b", "test.c"]);
    }

    #[test]
    fn test_execute_isolates_failures() {
        let runs = AtomicUsize::new(0);
        let ops = ops(
            &runs,
            &[
                ("test.a", Change::Create, true),
                ("test.b", Change::Create, false),
            ],
        );

        let result = execute_simple(&ops, &ExecuteOptions { dry_run: false, jobs: 1 }).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(result.summary.failed, 1);
        assert_eq!(result.summary.created, 1);
        assert!(!result.summary.is_success());
        match &result.reports[0].outcome {
            Outcome::Failed(e) => assert!(e.is_gone()),
            other => panic!("Expected Outcome::Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_execute_dry_run_skips() {
        let runs = AtomicUsize::new(0);
        let ops = ops(&runs, &[("test.a", Change::Create, false)]);

        let opts = ExecuteOptions {
            dry_run: true,
            jobs: 4,
        };
        let result = execute(&ops, &opts, &mut NoProgress, &mut AutoConfirm).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(result.summary.skipped, 1);
    }

    #[test]
    fn test_execute_declined() {
        let runs = AtomicUsize::new(0);
        let ops = ops(&runs, &[("test.a", Change::Delete, false)]);

        let result = execute(
            &ops,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(matches!(
            &result.reports[0].outcome,
            Outcome::Skipped { reason } if reason == "Declined"
        ));
    }

    #[test]
    fn test_execute_deletes_finish_before_creates() {
        let events = Mutex::new(Vec::new());
        let ops: Vec<BoxedOperation<'_, ()>> = [
            ("test.old", Change::Delete),
            ("test.new", Change::Create),
            ("test.moved", Change::Replace),
            ("test.kept", Change::Refresh),
            ("test.gone", Change::Delete),
        ]
        .into_iter()
        .map(|(address, change)| {
            Box::new(TimedOperation {
                address: address.to_string(),
                change,
                events: &events,
            }) as BoxedOperation<'_, ()>
        })
        .collect();

        let result = execute_simple(&ops, &ExecuteOptions { dry_run: false, jobs: 4 }).unwrap();
        assert!(result.summary.is_success());
        assert_eq!(result.summary.deleted, 2);

        let events = events.lock().unwrap().clone();
        let at = |event: &str| {
            events
                .iter()
                .position(|e| e == event)
                .unwrap_or_else(|| panic!("missing {event:?} in {events:?}"))
        };
        for deleted in ["test.old", "test.gone"] {
            assert!(at(&format!("end {deleted}")) < at("start test.moved"));
            assert!(at(&format!("end {deleted}")) < at("start test.new"));
        }
        assert!(at("end test.moved") < at("start test.new"));
        assert!(at("end test.moved") < at("start test.kept"));
    }
}
