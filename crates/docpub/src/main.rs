//! docpub CLI entry point

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use docpub::cli::{Cli, EXIT_CLI, exit_code_for, render_error};
use docpub::logging::init_logging;

fn main() {
    // NOTE: tracing may be unusable during a panic, so write directly to stderr.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.logging_config()) {
        eprintln!("{e:?}");
        std::process::exit(EXIT_CLI);
    }

    std::process::exit(run_with_tokio(&cli));
}

/// Create tokio runtime and run the selected command
fn run_with_tokio(cli: &Cli) -> i32 {
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            return 1;
        }
    };

    match rt.block_on(docpub::execute(cli)) {
        Ok(output) => {
            let rendered = output.render(cli.json);
            if !rendered.is_empty() {
                println!("{rendered}");
            }
            output.exit_code
        }
        Err(err) => {
            tracing::debug!(error = %err, "Command failed");
            render_error(&err, cli.json);
            exit_code_for(&err)
        }
    }
}
