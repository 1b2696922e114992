use crate::OutputFormat;
use crate::util::{CliResult, render_json, yes_no};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use winbridge_core::types::{AclEntry, AclSpecification, EffectivePermissions};
use winbridge_runtime::Runtime;

#[derive(Args, Debug, Clone)]
pub struct ElevateArgs {
    pub executable: PathBuf,
    /// Arguments passed to the elevated process.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    pub path: PathBuf,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AclCommand {
    /// Grant rights; existing grants for other principals are kept.
    Set {
        path: PathBuf,
        #[arg(required = true, value_name = "PRINCIPAL:RIGHTS")]
        entries: Vec<AclEntry>,
    },
    /// Revoke every grant of a principal.
    Remove { path: PathBuf, principal: String },
    /// Drop explicit grants and inherit from the parent again.
    Reset { path: PathBuf },
}

#[derive(Serialize, Debug, PartialEq)]
struct PathAnswer<'a> {
    path: &'a Path,
    requires_admin: bool,
}

#[derive(Serialize, Debug, PartialEq)]
struct PermissionSummary<'a> {
    path: &'a Path,
    #[serde(flatten)]
    permissions: EffectivePermissions,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum AclAction {
    Set,
    Remove,
    Reset,
}

#[derive(Serialize, Debug, PartialEq)]
struct AclChange<'a> {
    action: AclAction,
    path: &'a Path,
    entries: Vec<String>,
}

pub async fn elevate(
    runtime: &Runtime,
    args: &ElevateArgs,
    format: OutputFormat,
) -> CliResult<String> {
    let started = runtime.request_elevation(args.executable.clone(), args.args.clone()).await?;
    match format {
        OutputFormat::Text if started => {
            Ok(format!("Started {} elevated", args.executable.display()))
        }
        OutputFormat::Text => Ok("Elevation was declined or is not available".to_owned()),
        OutputFormat::Json => render_json(&serde_json::json!({ "started": started })),
    }
}

pub async fn requires_admin(
    runtime: &Runtime,
    args: &PathArgs,
    format: OutputFormat,
) -> CliResult<String> {
    let requires_admin = runtime.requires_admin_access(args.path.clone()).await?;
    match format {
        OutputFormat::Text => {
            Ok(format!(
                "{}: administrator access required: {}",
                args.path.display(),
                yes_no(requires_admin)
            ))
        }
        OutputFormat::Json => render_json(&PathAnswer { path: &args.path, requires_admin }),
    }
}

pub async fn perms(runtime: &Runtime, args: &PathArgs, format: OutputFormat) -> CliResult<String> {
    let permissions = runtime.get_effective_permissions(args.path.clone()).await?;
    match format {
        OutputFormat::Text => Ok(render_permissions_text(&args.path, permissions)),
        OutputFormat::Json => render_json(&PermissionSummary { path: &args.path, permissions }),
    }
}

fn render_permissions_text(path: &Path, permissions: EffectivePermissions) -> String {
    let mut output = String::new();
    let _ = writeln!(&mut output, "Permissions for {}", path.display());
    let _ = writeln!(&mut output, "  Read:    {}", yes_no(permissions.can_read));
    let _ = writeln!(&mut output, "  Write:   {}", yes_no(permissions.can_write));
    let _ = writeln!(&mut output, "  Execute: {}", yes_no(permissions.can_execute));
    let _ = writeln!(&mut output, "  Delete:  {}", yes_no(permissions.can_delete));
    output.trim_end().to_owned()
}

pub async fn acl(
    runtime: &Runtime,
    command: &AclCommand,
    format: OutputFormat,
) -> CliResult<String> {
    let change = match command {
        AclCommand::Set { path, entries } => {
            let spec: AclSpecification = entries.iter().cloned().collect();
            runtime.set_file_acl(path.clone(), spec.clone()).await?;
            AclChange {
                action: AclAction::Set,
                path,
                entries: spec.normalized().iter().map(ToString::to_string).collect(),
            }
        }
        AclCommand::Remove { path, principal } => {
            runtime.remove_file_acl(path.clone(), principal.clone()).await?;
            AclChange { action: AclAction::Remove, path, entries: vec![principal.clone()] }
        }
        AclCommand::Reset { path } => {
            runtime.reset_file_acl(path.clone()).await?;
            AclChange { action: AclAction::Reset, path, entries: Vec::new() }
        }
    };
    match format {
        OutputFormat::Text => Ok(render_acl_text(&change)),
        OutputFormat::Json => render_json(&change),
    }
}

fn render_acl_text(change: &AclChange<'_>) -> String {
    match change.action {
        AclAction::Set => format!(
            "Granted {} on {}",
            change.entries.join(", "),
            change.path.display()
        ),
        AclAction::Remove => format!(
            "Revoked grants of {} on {}",
            change.entries.join(", "),
            change.path.display()
        ),
        AclAction::Reset => format!("Reset access control list of {}", change.path.display()),
    }
}
