use std::{env, process::ExitCode};

use tracing::error;
use withvs::{logging, workflow, Environment, Invocation};

#[tokio::main]
async fn main() -> ExitCode {
    let inv = match Invocation::from_args_os(env::args_os().skip(1)) {
        Ok(inv) => inv,
        Err(e) => {
            logging::init(false);
            error!(error = %e, "invalid command line");
            return ExitCode::FAILURE;
        }
    };
    logging::init(inv.verbose());

    let exe = match env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            error!(error = %e, "failed to locate the current executable");
            return ExitCode::FAILURE;
        }
    };

    match workflow::run(&inv, Environment::capture(), &exe).await {
        Ok(()) => ExitCode::SUCCESS,
        // Already logged with its context.
        Err(_) => ExitCode::FAILURE,
    }
}
