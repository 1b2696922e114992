pub mod commands;
#[cfg(test)]
mod test_support;
mod util;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use winbridge_runtime::{BridgeConfig, Runtime};

use crate::commands::{privilege, process, registry};
use crate::util::CliResult;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "winbridge",
    version,
    about = "Manage Windows processes, shell registrations and privileges"
)]
pub struct Cli {
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// JSON configuration file.
    #[arg(long, global = true, env = "WINBRIDGE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Log verbosity; `RUST_LOG` takes precedence when set.
    #[arg(long = "log-level", global = true, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Terminate a process and all of its descendants. Ctrl-C stops before the next signal.
    KillTree(process::KillTreeArgs),
    /// List pids whose image name matches, ignoring case.
    Find(process::FindArgs),
    /// Show name, parent and elevation of running processes.
    Info(process::InfoArgs),
    /// Report whether a process, or this one, runs elevated.
    Elevated(process::ElevatedArgs),
    /// Associate a file extension with a program id and executable.
    RegisterFile(registry::RegisterFileArgs),
    /// Remove a file association.
    UnregisterFile(registry::UnregisterFileArgs),
    /// Register a URL protocol handler.
    RegisterProtocol(registry::RegisterProtocolArgs),
    /// Remove a URL protocol handler.
    UnregisterProtocol(registry::UnregisterProtocolArgs),
    /// Enable or disable launching an application at logon.
    Autostart(registry::AutostartArgs),
    /// Read back a registration.
    Lookup(registry::LookupArgs),
    /// Start an executable through the elevation prompt.
    Elevate(privilege::ElevateArgs),
    /// Report whether writing to a path needs administrator rights.
    RequiresAdmin(privilege::PathArgs),
    /// Show the effective permissions of the current user on a path.
    Perms(privilege::PathArgs),
    /// Edit the access control list of a path.
    #[command(subcommand)]
    Acl(privilege::AclCommand),
}

pub fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);
    let config = load_config(cli.config.as_deref())?;

    let executor = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let output = executor.block_on(async {
        let mut runtime = Runtime::with_config(config)?;
        let output = execute(&runtime, &cli).await;
        runtime.shutdown();
        output
    })?;

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

/// Runs one parsed command and returns the rendered output.
pub async fn execute(runtime: &Runtime, cli: &Cli) -> CliResult<String> {
    let format = cli.format;
    match &cli.command {
        Command::KillTree(args) => process::kill_tree(runtime, args, format).await,
        Command::Find(args) => process::find(runtime, args, format).await,
        Command::Info(args) => process::info(runtime, args, format).await,
        Command::Elevated(args) => process::elevated(runtime, args, format).await,
        Command::RegisterFile(args) => registry::register_file(runtime, args, format).await,
        Command::UnregisterFile(args) => registry::unregister_file(runtime, args, format).await,
        Command::RegisterProtocol(args) => registry::register_protocol(runtime, args, format).await,
        Command::UnregisterProtocol(args) => {
            registry::unregister_protocol(runtime, args, format).await
        }
        Command::Autostart(args) => registry::autostart(runtime, args, format).await,
        Command::Lookup(args) => registry::lookup(runtime, args, format).await,
        Command::Elevate(args) => privilege::elevate(runtime, args, format).await,
        Command::RequiresAdmin(args) => privilege::requires_admin(runtime, args, format).await,
        Command::Perms(args) => privilege::perms(runtime, args, format).await,
        Command::Acl(command) => privilege::acl(runtime, command, format).await,
    }
}

fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
    let _ =
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn load_config(path: Option<&Path>) -> CliResult<BridgeConfig> {
    let Some(path) = path else {
        return Ok(BridgeConfig::default());
    };
    let config = BridgeConfig::from_path(path)?;
    debug!(path = %path.display(), ?config, "configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use winbridge_runtime::ClassesScope;

    #[rstest]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "winbridge",
            "find",
            "notepad.exe",
            "--format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("parse");

        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert!(matches!(cli.command, Command::Find(ref args) if args.name == "notepad.exe"));
    }

    #[rstest]
    #[case(&["winbridge", "kill-tree", "abc"])]
    #[case(&["winbridge", "info"])]
    #[case(&["winbridge", "autostart", "MyApp"])]
    #[case(&["winbridge", "autostart", "MyApp", "--enable", "--disable"])]
    #[case(&["winbridge", "acl", "set", "C:\\data"])]
    #[case(&["winbridge", "acl", "set", "C:\\data", "Users"])]
    #[case(&["winbridge", "lookup", "service", "MyApp"])]
    fn rejects_malformed_invocations(#[case] argv: &[&str]) {
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[rstest]
    fn elevate_passes_hyphenated_arguments_through() {
        let argv = ["winbridge", "elevate", "C:\\Tools\\setup.exe", "--silent", "-v"];
        let cli = Cli::try_parse_from(argv).expect("parse");

        let Command::Elevate(args) = cli.command else { panic!("expected elevate") };
        assert_eq!(args.args, vec!["--silent".to_owned(), "-v".to_owned()]);
    }

    #[rstest]
    fn loads_configuration_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("winbridge.json");
        std::fs::write(&path, r#"{ "classes_scope": "user" }"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.classes_scope, ClassesScope::User);
        assert_eq!(load_config(None).unwrap(), BridgeConfig::default());
        assert!(load_config(Some(&dir.path().join("missing.json"))).is_err());
    }
}
