use clap::Parser;

use faultline_cli::app;
use faultline_cli::cli::Cli;

/// Exit code for unparsable command lines; same as any configuration error.
const USAGE_EXIT_CODE: i32 = 3;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { USAGE_EXIT_CODE } else { 0 };
            // Nothing more useful to do if printing the usage fails.
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let code = match app::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "faultline failed");
            eprintln!("error: {e}");
            e.exit_code()
        }
    };
    std::process::exit(code);
}
