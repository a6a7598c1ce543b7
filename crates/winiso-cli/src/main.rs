use winiso_core::logging;
use winiso_core::navigate::NavigationError;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible.
    logging::init_logging();

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("winiso error: {:#}", err);
        // `resolve` runs inside a driver container; its parent reads the
        // failure class from the exit status.
        let code = err
            .downcast_ref::<NavigationError>()
            .map_or(1, NavigationError::exit_code);
        std::process::exit(code);
    }
}
