use crate::OutputFormat;
use crate::util::{CliResult, render_json, yes_no};
use anyhow::bail;
use clap::{ArgGroup, Args, ValueEnum};
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;
use winbridge_core::types::{RegistrationEntry, RegistrationKind};
use winbridge_runtime::Runtime;

#[derive(Args, Debug, Clone)]
pub struct RegisterFileArgs {
    /// Extension with or without the leading dot.
    pub extension: String,
    pub program_id: String,
    pub executable: PathBuf,
    pub description: String,
    /// MIME type recorded under the extension key.
    #[arg(long = "content-type")]
    pub content_type: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UnregisterFileArgs {
    pub extension: String,
    pub program_id: String,
}

#[derive(Args, Debug, Clone)]
pub struct RegisterProtocolArgs {
    /// Scheme without `:`, e.g. `myapp`.
    pub protocol: String,
    pub executable: PathBuf,
    pub description: String,
}

#[derive(Args, Debug, Clone)]
pub struct UnregisterProtocolArgs {
    pub protocol: String,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("state").required(true).args(["enable", "disable"])))]
pub struct AutostartArgs {
    pub name: String,
    /// Executable to launch; required with `--enable`.
    #[arg(long = "exe")]
    pub executable: Option<PathBuf>,
    #[arg(long)]
    pub enable: bool,
    #[arg(long)]
    pub disable: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LookupKind {
    File,
    Protocol,
    Autostart,
}

#[derive(Args, Debug, Clone)]
pub struct LookupArgs {
    #[arg(value_enum)]
    pub kind: LookupKind,
    pub name: String,
}

#[derive(Serialize, Debug, PartialEq)]
struct Confirmation<'a> {
    action: &'static str,
    target: &'a str,
}

fn confirm(
    format: OutputFormat,
    action: &'static str,
    target: &str,
    text: String,
) -> CliResult<String> {
    match format {
        OutputFormat::Text => Ok(text),
        OutputFormat::Json => render_json(&Confirmation { action, target }),
    }
}

pub async fn register_file(
    runtime: &Runtime,
    args: &RegisterFileArgs,
    format: OutputFormat,
) -> CliResult<String> {
    runtime
        .register_file_association_with_content_type(
            args.extension.clone(),
            args.program_id.clone(),
            args.executable.clone(),
            args.description.clone(),
            args.content_type.clone(),
        )
        .await?;
    let text = format!(
        "Associated {} with {} ({})",
        args.extension,
        args.program_id,
        args.executable.display()
    );
    confirm(format, "register-file", &args.extension, text)
}

pub async fn unregister_file(
    runtime: &Runtime,
    args: &UnregisterFileArgs,
    format: OutputFormat,
) -> CliResult<String> {
    runtime.remove_file_association(args.extension.clone(), args.program_id.clone()).await?;
    let text = format!("Removed association of {} with {}", args.extension, args.program_id);
    confirm(format, "unregister-file", &args.extension, text)
}

pub async fn register_protocol(
    runtime: &Runtime,
    args: &RegisterProtocolArgs,
    format: OutputFormat,
) -> CliResult<String> {
    runtime
        .register_url_protocol(
            args.protocol.clone(),
            args.executable.clone(),
            args.description.clone(),
        )
        .await?;
    let text = format!("Registered {}: handled by {}", args.protocol, args.executable.display());
    confirm(format, "register-protocol", &args.protocol, text)
}

pub async fn unregister_protocol(
    runtime: &Runtime,
    args: &UnregisterProtocolArgs,
    format: OutputFormat,
) -> CliResult<String> {
    runtime.remove_url_protocol(args.protocol.clone()).await?;
    confirm(
        format,
        "unregister-protocol",
        &args.protocol,
        format!("Removed {}: handler", args.protocol),
    )
}

pub async fn autostart(
    runtime: &Runtime,
    args: &AutostartArgs,
    format: OutputFormat,
) -> CliResult<String> {
    if args.enable {
        let Some(executable) = args.executable.clone() else {
            bail!("--exe is required with --enable");
        };
        runtime.set_auto_start(args.name.clone(), executable, true).await?;
        confirm(format, "autostart-enable", &args.name, format!("{} starts at logon", args.name))
    } else {
        runtime
            .set_auto_start(args.name.clone(), args.executable.clone().unwrap_or_default(), false)
            .await?;
        confirm(
            format,
            "autostart-disable",
            &args.name,
            format!("{} no longer starts at logon", args.name),
        )
    }
}

pub async fn lookup(
    runtime: &Runtime,
    args: &LookupArgs,
    format: OutputFormat,
) -> CliResult<String> {
    let entry = match args.kind {
        LookupKind::File => runtime.lookup_file_association(args.name.clone()).await?,
        LookupKind::Protocol => runtime.lookup_url_protocol(args.name.clone()).await?,
        LookupKind::Autostart => runtime.lookup_auto_start(args.name.clone()).await?,
    };
    match format {
        OutputFormat::Text => Ok(entry.map_or_else(
            || format!("{} is not registered", args.name),
            |entry| render_entry_text(&entry),
        )),
        OutputFormat::Json => render_json(&entry),
    }
}

fn kind_label(kind: RegistrationKind) -> &'static str {
    match kind {
        RegistrationKind::FileAssociation => "File association",
        RegistrationKind::UrlProtocol => "URL protocol",
        RegistrationKind::AutoStart => "Auto-start entry",
    }
}

fn render_entry_text(entry: &RegistrationEntry) -> String {
    let mut output = String::new();
    let _ = writeln!(&mut output, "{}: {}", kind_label(entry.kind), entry.qualified_key());
    if let Some(program_id) = &entry.program_id {
        let _ = writeln!(&mut output, "  Program id: {program_id}");
    }
    let _ = writeln!(&mut output, "  Executable: {}", entry.executable_path.display());
    if let Some(description) = entry.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(&mut output, "  Description: {description}");
    }
    let _ = writeln!(&mut output, "  Enabled: {}", yes_no(entry.enabled));
    output.trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::mock_runtime;
    use rstest::rstest;
    use winbridge_core::types::RegistryHive;
    use winbridge_platform_mock::MockPlatform;

    fn executable(dir: &tempfile::TempDir) -> PathBuf {
        let exe = dir.path().join("reader.exe");
        std::fs::write(&exe, b"MZ").unwrap();
        exe
    }

    #[rstest]
    #[tokio::test]
    async fn register_then_lookup_file(
        #[from(mock_runtime)] (mock, runtime): (&'static MockPlatform, Runtime),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let args = RegisterFileArgs {
            extension: "rdx".into(),
            program_id: "Reader.Document".into(),
            executable: executable(&dir),
            description: "Reader document".into(),
            content_type: Some("application/x-reader".into()),
        };

        let output = register_file(&runtime, &args, OutputFormat::Text).await.unwrap();
        assert!(output.starts_with("Associated rdx with Reader.Document"));
        assert_eq!(
            mock.registry.value(RegistryHive::ClassesRoot, ".rdx", "Content Type").as_deref(),
            Some("application/x-reader")
        );

        let lookup_args = LookupArgs { kind: LookupKind::File, name: ".rdx".into() };
        let text = lookup(&runtime, &lookup_args, OutputFormat::Text).await.unwrap();
        assert!(text.starts_with(r"File association: HKCR\.rdx"));
        assert!(text.contains("  Program id: Reader.Document"));
        assert!(text.contains("  Description: Reader document"));
    }

    #[rstest]
    #[tokio::test]
    async fn lookup_missing_entry(
        #[from(mock_runtime)] (_mock, runtime): (&'static MockPlatform, Runtime),
    ) {
        let args = LookupArgs { kind: LookupKind::Protocol, name: "reader".into() };

        assert_eq!(
            lookup(&runtime, &args, OutputFormat::Text).await.unwrap(),
            "reader is not registered"
        );
        assert_eq!(lookup(&runtime, &args, OutputFormat::Json).await.unwrap(), "null");
    }

    #[rstest]
    #[tokio::test]
    async fn protocol_round_trip(
        #[from(mock_runtime)] (mock, runtime): (&'static MockPlatform, Runtime),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let args = RegisterProtocolArgs {
            protocol: "reader".into(),
            executable: executable(&dir),
            description: "URL:Reader".into(),
        };

        let json = register_protocol(&runtime, &args, OutputFormat::Json).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(parsed["action"], "register-protocol");
        assert!(mock.registry.has_key(RegistryHive::ClassesRoot, r"reader\shell\open\command"));

        let removal = UnregisterProtocolArgs { protocol: "reader".into() };
        unregister_protocol(&runtime, &removal, OutputFormat::Text).await.unwrap();
        assert!(!mock.registry.has_key(RegistryHive::ClassesRoot, "reader"));
    }

    #[rstest]
    #[tokio::test]
    async fn unregister_file_keeps_foreign_extension(
        #[from(mock_runtime)] (mock, runtime): (&'static MockPlatform, Runtime),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let exe = executable(&dir);
        runtime
            .register_file_association(".rdx", "Reader.Document", exe.clone(), "Reader")
            .await
            .unwrap();
        runtime.register_file_association(".rdx", "Other.Document", exe, "Other").await.unwrap();

        let args = UnregisterFileArgs {
            extension: ".rdx".into(),
            program_id: "Reader.Document".into(),
        };
        unregister_file(&runtime, &args, OutputFormat::Text).await.unwrap();

        assert_eq!(
            mock.registry.value(RegistryHive::ClassesRoot, ".rdx", "").as_deref(),
            Some("Other.Document")
        );
        assert!(!mock.registry.has_key(RegistryHive::ClassesRoot, "Reader.Document"));
    }

    #[rstest]
    #[tokio::test]
    async fn autostart_enable_requires_executable(
        #[from(mock_runtime)] (_mock, runtime): (&'static MockPlatform, Runtime),
    ) {
        let args = AutostartArgs {
            name: "Reader".into(),
            executable: None,
            enable: true,
            disable: false,
        };

        let err = autostart(&runtime, &args, OutputFormat::Text).await.unwrap_err();
        assert!(err.to_string().contains("--exe"));
    }

    #[rstest]
    #[tokio::test]
    async fn autostart_toggles_run_entry(
        #[from(mock_runtime)] (_mock, runtime): (&'static MockPlatform, Runtime),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let enable = AutostartArgs {
            name: "Reader".into(),
            executable: Some(executable(&dir)),
            enable: true,
            disable: false,
        };
        let disable = AutostartArgs {
            name: "Reader".into(),
            executable: None,
            enable: false,
            disable: true,
        };

        assert_eq!(
            autostart(&runtime, &enable, OutputFormat::Text).await.unwrap(),
            "Reader starts at logon"
        );
        assert!(runtime.is_auto_start_enabled("Reader").await.unwrap());

        autostart(&runtime, &disable, OutputFormat::Text).await.unwrap();
        autostart(&runtime, &disable, OutputFormat::Text).await.unwrap();
        assert!(!runtime.is_auto_start_enabled("Reader").await.unwrap());
    }
}
