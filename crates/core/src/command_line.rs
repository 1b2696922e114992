//! Windows command-line composition.
//!
//! Quoting follows the rules `CommandLineToArgvW` and the MSVC runtime use to
//! split a command line, so every argument survives the round trip through
//! `ShellExecuteExW` or a registry `shell\open\command` value unchanged.

use std::path::{Path, PathBuf};

/// Placeholder the shell replaces with the opened file or URL.
pub const ARGUMENT_PLACEHOLDER: &str = "%1";

pub fn quote_argument(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '\n', '\u{b}', '"']) {
        return arg.to_owned();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    let mut backslashes = 0usize;
    for ch in arg.chars() {
        match ch {
            '\\' => backslashes += 1,
            '"' => {
                quoted.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                quoted.extend(std::iter::repeat_n('\\', backslashes));
                quoted.push(ch);
                backslashes = 0;
            }
        }
    }
    // Trailing backslashes precede the closing quote and must be doubled.
    quoted.extend(std::iter::repeat_n('\\', backslashes * 2));
    quoted.push('"');
    quoted
}

pub fn join_arguments<S: AsRef<str>>(args: &[S]) -> String {
    args.iter().map(|arg| quote_argument(arg.as_ref())).collect::<Vec<_>>().join(" ")
}

/// `"C:\path\app.exe" "%1"`, the value of a `shell\open\command` key.
pub fn open_command(executable: &Path) -> String {
    format!("\"{}\" \"{ARGUMENT_PLACEHOLDER}\"", executable.display())
}

/// `C:\path\app.exe,0`, the value of a `DefaultIcon` key.
pub fn default_icon(executable: &Path) -> String {
    format!("{},0", executable.display())
}

/// Always-quoted executable path, as written to the startup `Run` key.
pub fn quoted_executable(executable: &Path) -> String {
    format!("\"{}\"", executable.display())
}

/// Extracts the executable from a command value written by [`open_command`]
/// or [`quoted_executable`]. Unquoted values are split at the first blank.
pub fn parse_command_executable(command: &str) -> Option<PathBuf> {
    let command = command.trim_start();
    let executable = if let Some(rest) = command.strip_prefix('"') {
        rest.split_once('"').map_or(rest, |(path, _)| path)
    } else {
        command.split_whitespace().next().unwrap_or_default()
    };
    (!executable.is_empty()).then(|| PathBuf::from(executable))
}
