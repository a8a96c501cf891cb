use std::process::ExitCode;

fn main() -> ExitCode {
    match settle_ledger::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
