//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - runs the study pipeline
//! - prints the report and the plots

use clap::Parser;

use crate::cli::{Cli, Command, StudyArgs, rewrite_args};
use crate::error::AppError;
use crate::logging::init_logging;

pub mod pipeline;

/// Entry point for the `halts` binary.
pub fn run() -> Result<(), AppError> {
    // `halts` and `halts -n 500` behave like `halts run ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Tui(args) => handle_tui(args),
    }
}

fn handle_run(args: StudyArgs) -> Result<(), AppError> {
    init_logging(args.verbose, false);
    let config = args.to_config();
    let run = pipeline::run_study(&config)?;

    if config.json {
        println!("{}", crate::report::report_json(&run.report)?);
        return Ok(());
    }

    println!("{}", crate::report::format_report(&run.report));

    if config.plot {
        let plot = crate::plot::render_study_panels(
            &run.dataset,
            &run.marginal_effect,
            &run.calibration,
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    Ok(())
}

fn handle_tui(args: StudyArgs) -> Result<(), AppError> {
    init_logging(args.verbose, true);
    crate::tui::run(args)
}
