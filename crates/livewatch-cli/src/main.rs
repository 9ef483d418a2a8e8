//! livewatch - LiveReload server.
//!
//! Parses arguments, loads configuration, initializes logging, and runs the
//! server until Ctrl+C.

use clap::Parser;
use livewatch_cli::{cli, config, error, logger, run, ui};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let options =
        config::load(args.config.as_deref(), args.to_options()).map_err(error::cli_error_to_miette)?;

    // The `debug` option raises logging like --verbose does
    let verbose = args.verbose || options.debug.unwrap_or(false);
    logger::init_logger(verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    run::execute(options, args.paths)
        .await
        .map_err(error::cli_error_to_miette)
}
