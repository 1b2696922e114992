use crate::OutputFormat;
use crate::util::{CliResult, render_json, yes_no};
use clap::Args;
use serde::Serialize;
use std::fmt::Write;
use tracing::warn;
use winbridge_core::types::ProcessRecord;
use winbridge_runtime::{CancellationToken, KillReport, RootOutcome, Runtime};

#[derive(Args, Debug, Clone)]
pub struct KillTreeArgs {
    pub pid: u32,
}

#[derive(Args, Debug, Clone)]
pub struct FindArgs {
    /// Image name such as `notepad.exe`.
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    #[arg(required = true, value_name = "PID")]
    pub pids: Vec<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct ElevatedArgs {
    /// Process to inspect; defaults to this process.
    pub pid: Option<u32>,
}

#[derive(Serialize, Debug, PartialEq)]
struct FindSummary<'a> {
    name: &'a str,
    pids: Vec<u32>,
}

#[derive(Serialize, Debug, PartialEq)]
struct ElevationSummary {
    pid: Option<u32>,
    elevated: bool,
}

pub async fn kill_tree(
    runtime: &Runtime,
    args: &KillTreeArgs,
    format: OutputFormat,
) -> CliResult<String> {
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted; stopping before the next termination");
                cancel.cancel();
            }
        }
    });
    let result = runtime.terminate_tree(args.pid, cancel).await;
    interrupt.abort();

    let report = result?;
    match format {
        OutputFormat::Text => Ok(render_kill_text(&report)),
        OutputFormat::Json => render_json(&report),
    }
}

fn render_kill_text(report: &KillReport) -> String {
    let mut output = String::new();
    match report.root {
        RootOutcome::NotRunning => {
            let _ = write!(&mut output, "Process {} is not running", report.pid);
            return output;
        }
        RootOutcome::Vanished => {
            let _ = writeln!(
                &mut output,
                "Process {} exited before it could be terminated",
                report.pid
            );
        }
        RootOutcome::Terminated => {
            let _ = writeln!(&mut output, "Terminated process tree of {}", report.pid);
        }
    }
    let _ = writeln!(
        &mut output,
        "Terminated: {}, already exited: {}, failed: {}",
        report.terminated.len(),
        report.vanished.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        let _ = writeln!(&mut output, "  - {}: {}", failure.pid, failure.reason);
    }
    output.trim_end().to_owned()
}

pub async fn find(runtime: &Runtime, args: &FindArgs, format: OutputFormat) -> CliResult<String> {
    let pids = runtime.list_processes_by_name(args.name.clone()).await?;
    match format {
        OutputFormat::Text if pids.is_empty() => Ok(format!("No process named {}", args.name)),
        OutputFormat::Text => Ok(pids.iter().map(u32::to_string).collect::<Vec<_>>().join("\n")),
        OutputFormat::Json => render_json(&FindSummary { name: &args.name, pids }),
    }
}

pub async fn info(runtime: &Runtime, args: &InfoArgs, format: OutputFormat) -> CliResult<String> {
    let records = runtime.get_process_info(args.pids.clone()).await?;
    match format {
        OutputFormat::Text => Ok(render_info_text(&records)),
        OutputFormat::Json => render_json(&records),
    }
}

fn render_info_text(records: &[ProcessRecord]) -> String {
    if records.is_empty() {
        return "No matching processes".to_owned();
    }
    let mut output = String::new();
    for record in records {
        let parent = record.parent_pid.map_or_else(|| "-".to_owned(), |pid| pid.to_string());
        let _ = writeln!(
            &mut output,
            "{:>7}  {}  (parent: {}, elevated: {})",
            record.pid,
            record.name,
            parent,
            yes_no(record.is_elevated)
        );
    }
    output.trim_end().to_owned()
}

pub async fn elevated(
    runtime: &Runtime,
    args: &ElevatedArgs,
    format: OutputFormat,
) -> CliResult<String> {
    let elevated = match args.pid {
        Some(pid) => runtime.is_process_elevated(pid).await?,
        None => runtime.is_running_as_admin().await?,
    };
    let summary = ElevationSummary { pid: args.pid, elevated };
    match format {
        OutputFormat::Text => Ok(match summary.pid {
            Some(pid) => format!("Process {pid} elevated: {}", yes_no(elevated)),
            None => format!("Current process elevated: {}", yes_no(elevated)),
        }),
        OutputFormat::Json => render_json(&summary),
    }
}
