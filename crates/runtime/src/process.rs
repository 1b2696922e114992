//! Process-tree discovery and bottom-up termination.
//!
//! Every call enumerates the live process table again. Pids are recycled by
//! the OS, so a tree is never kept beyond the operation that built it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use winbridge_core::platform::{PlatformErrorKind, ProcessProvider};
use winbridge_core::types::ProcessRecord;

use crate::BridgeError;

/// Snapshot of the process table with a parent → children index.
///
/// A record whose parent is missing from the snapshot (or names itself) is a
/// root. Children are kept sorted by pid.
#[derive(Debug, Clone, Default)]
pub struct ProcessTree {
    records: BTreeMap<u32, ProcessRecord>,
    children: BTreeMap<u32, Vec<u32>>,
}

impl ProcessTree {
    pub fn build(records: impl IntoIterator<Item = ProcessRecord>) -> Self {
        let records: BTreeMap<u32, ProcessRecord> =
            records.into_iter().map(|record| (record.pid, record)).collect();
        let mut children: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for record in records.values() {
            let parent = record
                .parent_pid
                .filter(|parent| *parent != record.pid && records.contains_key(parent));
            if let Some(parent) = parent {
                children.entry(parent).or_default().push(record.pid);
            }
        }
        Self { records, children }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.records.contains_key(&pid)
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        self.records.get(&pid)
    }

    pub fn children(&self, pid: u32) -> &[u32] {
        self.children.get(&pid).map_or(&[], Vec::as_slice)
    }

    pub fn records(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records.values()
    }

    /// Pids whose parent is not part of the snapshot.
    pub fn roots(&self) -> impl Iterator<Item = u32> + '_ {
        self.records
            .values()
            .filter(|record| {
                record.parent_pid.is_none_or(|parent| {
                    parent == record.pid || !self.records.contains_key(&parent)
                })
            })
            .map(|record| record.pid)
    }

    /// Every transitive descendant of `pid` in breadth-first order, without `pid` itself.
    pub fn descendants(&self, pid: u32) -> Vec<u32> {
        let mut visited = BTreeSet::from([pid]);
        let mut queue: VecDeque<u32> = self.children(pid).iter().copied().collect();
        let mut found = Vec::new();
        while let Some(next) = queue.pop_front() {
            if !visited.insert(next) {
                continue;
            }
            found.push(next);
            queue.extend(self.children(next).iter().copied());
        }
        found
    }

    /// Post-order walk below `pid`: each process comes after all of its
    /// descendants and `pid` itself comes last. Empty if `pid` is unknown.
    pub fn termination_order(&self, pid: u32) -> Vec<u32> {
        let mut order = Vec::new();
        if !self.contains(pid) {
            return order;
        }
        let mut visited = BTreeSet::from([pid]);
        let mut stack = vec![(pid, 0usize)];
        while let Some((node, next_child)) = stack.last_mut() {
            if let Some(&child) = self.children(*node).get(*next_child) {
                *next_child += 1;
                if visited.insert(child) {
                    stack.push((child, 0));
                }
            } else {
                order.push(*node);
                stack.pop();
            }
        }
        order
    }
}

/// What happened to the requested root process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RootOutcome {
    /// The pid was not in the process table.
    NotRunning,
    /// The root was signalled after its descendants.
    Terminated,
    /// The root was listed but exited before it could be signalled.
    Vanished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminationFailure {
    pub pid: u32,
    pub reason: String,
}

/// Per-node outcome of a tree termination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KillReport {
    pub pid: u32,
    pub root: RootOutcome,
    /// Signalled pids in the order they were signalled.
    pub terminated: Vec<u32>,
    /// Pids that were gone by the time they were signalled.
    pub vanished: Vec<u32>,
    /// Descendants the OS refused to terminate.
    pub failures: Vec<TerminationFailure>,
}

impl KillReport {
    fn new(pid: u32) -> Self {
        Self {
            pid,
            root: RootOutcome::NotRunning,
            terminated: Vec::new(),
            vanished: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn root_terminated(&self) -> bool {
        self.root == RootOutcome::Terminated
    }
}

#[derive(Clone)]
pub struct ProcessController {
    provider: &'static dyn ProcessProvider,
}

impl std::fmt::Debug for ProcessController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessController").field("provider", &self.provider.name()).finish()
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), BridgeError> {
    if cancel.is_cancelled() { Err(BridgeError::Cancelled) } else { Ok(()) }
}

impl ProcessController {
    pub fn new(provider: &'static dyn ProcessProvider) -> Self {
        Self { provider }
    }

    /// Enumerates the live process table. Failure here is fatal for the caller.
    pub fn snapshot_tree(&self) -> Result<ProcessTree, BridgeError> {
        let records = self.provider.snapshot()?;
        debug!(count = records.len(), "process table enumerated");
        Ok(ProcessTree::build(records))
    }

    /// Terminates `pid` and every descendant, leaves first.
    pub fn kill_process_tree(&self, pid: u32) -> Result<bool, BridgeError> {
        self.terminate_tree(pid, &CancellationToken::new()).map(|report| report.root_terminated())
    }

    /// Terminates `pid` and every descendant, leaves first, checking `cancel`
    /// before each signal.
    ///
    /// Refusals on descendants are collected in the report and do not stop
    /// the walk. A refusal on the root is returned as the error once all
    /// descendants have been attempted.
    pub fn terminate_tree(
        &self,
        pid: u32,
        cancel: &CancellationToken,
    ) -> Result<KillReport, BridgeError> {
        if pid == 0 {
            return Err(BridgeError::invalid_argument("pid 0 is the system idle process"));
        }
        check_cancelled(cancel)?;

        let tree = self.snapshot_tree()?;
        let mut report = KillReport::new(pid);
        if !tree.contains(pid) {
            debug!(pid, "process not running; nothing to terminate");
            return Ok(report);
        }

        let order = tree.termination_order(pid);
        debug!(pid, descendants = order.len() - 1, "terminating process tree");
        for node in order {
            if let Err(err) = check_cancelled(cancel) {
                let terminated = report.terminated.len();
                info!(pid, terminated, "process tree termination cancelled");
                return Err(err);
            }
            match self.provider.terminate(node) {
                Ok(()) => {
                    report.terminated.push(node);
                    if node == pid {
                        report.root = RootOutcome::Terminated;
                    }
                }
                Err(err) if err.is_not_found() => {
                    debug!(pid = node, "process exited before termination");
                    report.vanished.push(node);
                    if node == pid {
                        report.root = RootOutcome::Vanished;
                    }
                }
                Err(err) if node == pid => {
                    let failures = report.failures.len();
                    warn!(pid, failures, error = %err, "failed to terminate root process");
                    return Err(err.into());
                }
                Err(err) => {
                    warn!(pid = node, root = pid, error = %err, "failed to terminate descendant");
                    report.failures.push(TerminationFailure { pid: node, reason: err.to_string() });
                }
            }
        }

        info!(
            pid,
            terminated = report.terminated.len(),
            vanished = report.vanished.len(),
            failed = report.failures.len(),
            "process tree terminated"
        );
        Ok(report)
    }

    /// Pids whose image name equals `name`, ignoring case. Empty when nothing matches.
    pub fn list_processes_by_name(&self, name: &str) -> Result<Vec<u32>, BridgeError> {
        self.list_processes_by_name_cancellable(name, &CancellationToken::new())
    }

    pub fn list_processes_by_name_cancellable(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u32>, BridgeError> {
        check_cancelled(cancel)?;
        let records = self.provider.snapshot()?;
        let mut pids = Vec::new();
        for record in &records {
            check_cancelled(cancel)?;
            if record.name_matches(name) {
                pids.push(record.pid);
            }
        }
        debug!(name, matches = pids.len(), "processes listed by name");
        Ok(pids)
    }

    /// Elevation of `pid`'s token; `false` when the process is gone or its
    /// token cannot be opened.
    pub fn is_process_elevated(&self, pid: u32) -> Result<bool, BridgeError> {
        match self.provider.is_elevated(pid) {
            Ok(elevated) => Ok(elevated),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) if err.kind() == PlatformErrorKind::AccessDenied => {
                debug!(pid, error = %err, "token not readable; reporting not elevated");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Records for the requested pids in request order. Pids that are not
    /// running, or exit during the lookup, are left out. Duplicates are
    /// reported once.
    pub fn get_process_info(&self, pids: &[u32]) -> Result<Vec<ProcessRecord>, BridgeError> {
        let tree = self.snapshot_tree()?;
        let mut seen = BTreeSet::new();
        let mut found = Vec::with_capacity(pids.len());
        for &pid in pids {
            if !seen.insert(pid) {
                continue;
            }
            let Some(record) = tree.get(pid) else {
                continue;
            };
            let elevated = match self.provider.is_elevated(pid) {
                Ok(elevated) => elevated,
                Err(err) if err.is_not_found() => {
                    debug!(pid, "process exited during lookup");
                    continue;
                }
                Err(err) => {
                    debug!(pid, error = %err, "elevation unknown; reporting not elevated");
                    false
                }
            };
            found.push(record.clone().with_elevated(elevated));
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::test_support::mock_platform;
    use rstest::rstest;
    use winbridge_platform_mock::MockPlatform;

    fn record(pid: u32, parent: Option<u32>) -> ProcessRecord {
        ProcessRecord::new(pid, format!("p{pid}.exe"), parent)
    }

    /// 1 ─┬─ 2 ─┬─ 4
    ///    │     └─ 5 ── 7
    ///    └─ 3 ── 6
    fn sample_tree() -> ProcessTree {
        ProcessTree::build([
            record(1, None),
            record(2, Some(1)),
            record(3, Some(1)),
            record(4, Some(2)),
            record(5, Some(2)),
            record(6, Some(3)),
            record(7, Some(5)),
        ])
    }

    fn seed(platform: &MockPlatform, records: &[(u32, &str, Option<u32>)]) {
        for &(pid, name, parent) in records {
            platform.processes.spawn(pid, name, parent);
        }
    }

    #[rstest]
    fn termination_order_is_post_order_with_root_last() {
        let tree = sample_tree();
        assert_eq!(tree.termination_order(1), vec![4, 7, 5, 2, 6, 3, 1]);
        assert_eq!(tree.termination_order(5), vec![7, 5]);
        assert!(tree.termination_order(99).is_empty());
    }

    #[rstest]
    fn every_descendant_precedes_its_ancestors() {
        let tree = sample_tree();
        let order = tree.termination_order(1);
        let position = |pid: u32| order.iter().position(|candidate| *candidate == pid).unwrap();
        for record in tree.records() {
            if let Some(parent) = record.parent_pid {
                assert!(position(record.pid) < position(parent), "{} before {parent}", record.pid);
            }
        }
    }

    #[rstest]
    fn descendants_are_breadth_first() {
        assert_eq!(sample_tree().descendants(1), vec![2, 3, 4, 5, 6, 7]);
        assert!(sample_tree().descendants(6).is_empty());
    }

    #[rstest]
    fn missing_parent_makes_a_root() {
        let tree =
            ProcessTree::build([record(10, Some(999)), record(11, Some(10)), record(4, Some(4))]);
        let mut roots: Vec<_> = tree.roots().collect();
        roots.sort_unstable();
        assert_eq!(roots, vec![4, 10]);
        assert_eq!(tree.termination_order(10), vec![11, 10]);
        assert_eq!(tree.termination_order(4), vec![4]);
    }

    #[rstest]
    fn parent_cycles_terminate_each_pid_once() {
        let tree =
            ProcessTree::build([record(20, Some(21)), record(21, Some(20)), record(22, Some(21))]);
        assert_eq!(tree.termination_order(20), vec![22, 21, 20]);
        assert_eq!(tree.descendants(21), vec![20, 22]);
    }

    #[rstest]
    fn kill_tree_terminates_bottom_up(mock_platform: &'static MockPlatform) {
        seed(mock_platform, &[
            (100, "app.exe", None),
            (101, "worker.exe", Some(100)),
            (102, "helper.exe", Some(101)),
            (200, "other.exe", None),
        ]);
        let controller = ProcessController::new(&mock_platform.processes);

        assert!(controller.kill_process_tree(100).unwrap());

        assert_eq!(mock_platform.processes.take_terminated(), vec![102, 101, 100]);
        assert!(mock_platform.processes.is_running(200));
    }

    #[rstest]
    fn absent_root_is_not_an_error(mock_platform: &'static MockPlatform) {
        let controller = ProcessController::new(&mock_platform.processes);
        let report = controller.terminate_tree(4242, &CancellationToken::new()).unwrap();
        assert_eq!(report.root, RootOutcome::NotRunning);
        assert!(!controller.kill_process_tree(4242).unwrap());
    }

    #[rstest]
    fn pid_zero_is_rejected(mock_platform: &'static MockPlatform) {
        let controller = ProcessController::new(&mock_platform.processes);
        assert_eq!(controller.kill_process_tree(0).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[rstest]
    fn descendant_failures_do_not_stop_siblings(mock_platform: &'static MockPlatform) {
        seed(
            mock_platform,
            &[
                (1, "root.exe", None),
                (2, "a.exe", Some(1)),
                (3, "b.exe", Some(1)),
                (4, "c.exe", Some(1)),
            ],
        );
        mock_platform.processes.deny_terminate(2);
        mock_platform.processes.vanish_on_terminate(3);
        let controller = ProcessController::new(&mock_platform.processes);

        let report = controller.terminate_tree(1, &CancellationToken::new()).unwrap();

        assert_eq!(report.root, RootOutcome::Terminated);
        assert_eq!(report.terminated, vec![4, 1]);
        assert_eq!(report.vanished, vec![3]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].pid, 2);
        assert!(mock_platform.processes.is_running(2));
    }

    #[rstest]
    fn root_refusal_is_surfaced_after_descendants(mock_platform: &'static MockPlatform) {
        seed(mock_platform, &[(1, "root.exe", None), (2, "child.exe", Some(1))]);
        mock_platform.processes.deny_terminate(1);
        let controller = ProcessController::new(&mock_platform.processes);

        let err = controller.kill_process_tree(1).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        assert_eq!(mock_platform.processes.take_terminated(), vec![2]);
    }

    #[rstest]
    fn vanished_root_reports_false(mock_platform: &'static MockPlatform) {
        seed(mock_platform, &[(8, "short.exe", None)]);
        mock_platform.processes.vanish_on_terminate(8);
        let controller = ProcessController::new(&mock_platform.processes);

        let report = controller.terminate_tree(8, &CancellationToken::new()).unwrap();

        assert_eq!(report.root, RootOutcome::Vanished);
        assert!(!report.root_terminated());
    }

    #[rstest]
    fn cancelled_token_stops_before_any_signal(mock_platform: &'static MockPlatform) {
        seed(mock_platform, &[(1, "root.exe", None), (2, "child.exe", Some(1))]);
        let controller = ProcessController::new(&mock_platform.processes);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = controller.terminate_tree(1, &cancel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(mock_platform.processes.take_terminated().is_empty());
        assert_eq!(
            controller.list_processes_by_name_cancellable("root.exe", &cancel).unwrap_err().kind(),
            ErrorKind::Cancelled
        );
    }

    #[rstest]
    fn enumeration_failure_is_fatal(mock_platform: &'static MockPlatform) {
        mock_platform.processes.set_unavailable(true);
        let controller = ProcessController::new(&mock_platform.processes);

        let unavailable = ErrorKind::SubsystemUnavailable;
        assert_eq!(controller.kill_process_tree(1).unwrap_err().kind(), unavailable);
        assert_eq!(controller.list_processes_by_name("x.exe").unwrap_err().kind(), unavailable);
    }

    #[rstest]
    fn list_by_name_is_case_insensitive_and_exact(mock_platform: &'static MockPlatform) {
        seed(
            mock_platform,
            &[(5, "Notepad.exe", None), (6, "notepad.exe", None), (7, "notepad++.exe", None)],
        );
        let controller = ProcessController::new(&mock_platform.processes);

        assert_eq!(controller.list_processes_by_name("NOTEPAD.EXE").unwrap(), vec![5, 6]);
        assert!(controller.list_processes_by_name("nonexistent.exe").unwrap().is_empty());
    }

    #[rstest]
    fn elevation_of_missing_process_is_false(mock_platform: &'static MockPlatform) {
        seed(mock_platform, &[(9, "admin.exe", None)]);
        mock_platform.processes.set_elevated(9, true);
        let controller = ProcessController::new(&mock_platform.processes);

        assert!(controller.is_process_elevated(9).unwrap());
        assert!(!controller.is_process_elevated(10).unwrap());
    }

    #[rstest]
    fn unreadable_token_counts_as_not_elevated(mock_platform: &'static MockPlatform) {
        seed(mock_platform, &[(12, "system.exe", None)]);
        mock_platform.processes.set_elevated(12, true);
        mock_platform.processes.deny_elevation_query(12);
        let controller = ProcessController::new(&mock_platform.processes);

        let info = controller.get_process_info(&[12]).unwrap();

        assert!(!controller.is_process_elevated(12).unwrap());
        assert_eq!(info, vec![ProcessRecord::new(12, "system.exe", None)]);
    }

    #[rstest]
    fn process_info_skips_missing_pids(mock_platform: &'static MockPlatform) {
        seed(mock_platform, &[(30, "a.exe", None), (31, "b.exe", Some(30))]);
        mock_platform.processes.set_elevated(31, true);
        let controller = ProcessController::new(&mock_platform.processes);

        let info = controller.get_process_info(&[31, 99, 30, 31]).unwrap();

        assert_eq!(info, vec![
            ProcessRecord::new(31, "b.exe", Some(30)).with_elevated(true),
            ProcessRecord::new(30, "a.exe", None),
        ]);
    }
}
