//! Command-line parsing for the trading-halt GLM study.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use clap::{ArgAction, Parser, Subcommand};

use crate::domain::{DEFAULT_GRID_POINTS, DEFAULT_SAMPLE_COUNT, DEFAULT_SEED, StudyConfig};
use crate::plot::MIN_GRID_POINTS;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "halts",
    version,
    about = "Trading-halt count study: Poisson vs Negative Binomial GLMs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Simulate a dataset, fit both models, and print the report.
    Run(StudyArgs),
    /// Launch the interactive TUI.
    ///
    /// This uses the same underlying pipeline as `halts run`, but renders the
    /// marginal-effect and calibration views as charts using Ratatui.
    Tui(StudyArgs),
}

/// Options shared by `run` and `tui`.
#[derive(Debug, Parser, Clone)]
pub struct StudyArgs {
    /// Number of synthetic observations to generate.
    #[arg(short = 'n', long, default_value_t = DEFAULT_SAMPLE_COUNT)]
    pub sample_count: usize,

    /// Random seed for the data generator.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Number of volatility values on the marginal-effect grid (at least 2).
    #[arg(long, default_value_t = DEFAULT_GRID_POINTS, value_parser = parse_grid_points)]
    pub grid_points: usize,

    /// Render ASCII plots in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width per panel (columns).
    #[arg(long, default_value_t = 60)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Print the report as a JSON object instead of text.
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl StudyArgs {
    /// Study configuration for these flags (simulation parameters at defaults).
    pub fn to_config(&self) -> StudyConfig {
        StudyConfig {
            sample_count: self.sample_count,
            seed: self.seed,
            grid_points: self.grid_points,
            plot: self.plot && !self.no_plot,
            plot_width: self.width,
            plot_height: self.height,
            json: self.json,
            ..StudyConfig::default()
        }
    }
}

fn parse_grid_points(raw: &str) -> Result<usize, String> {
    let n: usize = raw.parse::<usize>().map_err(|e| e.to_string())?;
    if n < MIN_GRID_POINTS {
        return Err(format!("the grid needs at least {MIN_GRID_POINTS} points, got {n}"));
    }
    Ok(n)
}

/// Rewrite argv so `halts` defaults to `halts run`.
///
/// Rules:
/// - `halts`                     -> `halts run`
/// - `halts -n 500 ...`          -> `halts run -n 500 ...`
/// - `halts --help/--version/-h` -> unchanged (show top-level help/version)
pub fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "tui");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "run flags".
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_runs_the_study() {
        assert_eq!(rewrite_args(argv(&["halts"])), argv(&["halts", "run"]));
    }

    #[test]
    fn leading_flags_go_to_run() {
        assert_eq!(
            rewrite_args(argv(&["halts", "-n", "500", "--seed", "3"])),
            argv(&["halts", "run", "-n", "500", "--seed", "3"])
        );
    }

    #[test]
    fn subcommands_and_help_are_untouched() {
        for a in [
            argv(&["halts", "tui", "-n", "10"]),
            argv(&["halts", "run"]),
            argv(&["halts", "--help"]),
            argv(&["halts", "-V"]),
        ] {
            assert_eq!(rewrite_args(a.clone()), a);
        }
    }

    #[test]
    fn defaults_match_study_defaults() {
        let cli = Cli::parse_from(rewrite_args(argv(&["halts"])));
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.to_config();
        assert_eq!(config.sample_count, 1000);
        assert_eq!(config.seed, 2025);
        assert_eq!(config.grid_points, 200);
        assert!(config.plot);
        assert!(!config.json);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn flags_map_into_config() {
        let cli = Cli::parse_from(argv(&[
            "halts", "run", "-n", "250", "--seed", "9", "--no-plot", "--json", "-vv", "--width", "40",
        ]));
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.to_config();
        assert_eq!(config.sample_count, 250);
        assert_eq!(config.seed, 9);
        assert!(!config.plot);
        assert!(config.json);
        assert_eq!(config.plot_width, 40);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn grid_needs_two_points() {
        for bad in ["0", "1", "x"] {
            assert!(Cli::try_parse_from(argv(&["halts", "run", "--grid-points", bad])).is_err());
        }
        let cli = Cli::parse_from(argv(&["halts", "run", "--grid-points", "2"]));
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.grid_points, 2);
    }
}
