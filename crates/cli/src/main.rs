winbridge_link::winbridge_link_os_providers!();

fn main() {
    if let Err(error) = winbridge_cli::run() {
        // Tracing is initialized inside run() after argument parsing.
        tracing::error!(error = format!("{error:#}"), "CLI execution failed");
        std::process::exit(1);
    }
}
