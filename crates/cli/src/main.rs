use std::process::ExitCode;

fn main() -> ExitCode {
    pumpfit_cli::run()
}
