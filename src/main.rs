use std::process::ExitCode;

use forkmerge::ui::output;

fn main() -> ExitCode {
    match forkmerge::cli::run() {
        Ok(code) => code,
        Err(e) => {
            output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
