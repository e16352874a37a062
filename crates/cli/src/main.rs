use std::process::ExitCode;

fn main() -> ExitCode {
    incidentfox_cli::run()
}
