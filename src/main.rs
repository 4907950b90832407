// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use framefx::FilterType;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "framefx")]
#[command(about = "Apply camera filters to images and frame streams")]
#[command(version)]
struct Cli {
    /// Parameter store file (default: <config dir>/framefx/parameters.json)
    #[arg(long, global = true)]
    params: Option<PathBuf>,

    /// Keep parameters in memory only; nothing is read or written
    #[arg(long, global = true, conflicts_with = "params")]
    ephemeral: bool,

    /// Do not open a GPU device; compute filters become unavailable
    #[arg(long, global = true)]
    no_gpu: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List filters by group
    List {
        /// Only show this group (e.g. "Colors", "Favorites")
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Filter a still image
    Apply {
        /// Input image
        input: PathBuf,

        /// Filter name (from 'framefx list'; default: the configured photo filter)
        #[arg(short = 'F', long)]
        filter: Option<String>,

        /// Second image for two-image filters
        #[arg(long)]
        with: Option<PathBuf>,

        /// Output file path (default: ~/Pictures/framefx/NAME_FILTER_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// One-shot parameter override as Field=value; repeatable
        #[arg(short = 'p', long = "param")]
        overrides: Vec<String>,
    },

    /// Show the stored parameters of a filter
    Get {
        filter: String,

        /// Only this field
        field: Option<String>,
    },

    /// Store one parameter of a filter
    Set {
        filter: String,
        field: String,
        value: String,
    },

    /// Write default parameters and zeroed statistics
    Seed {
        /// Only this filter
        filter: Option<String>,
    },

    /// Show render statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Zero render statistics of every filter
    ResetStats,

    /// Rate a filter
    Rate {
        filter: String,

        /// Stars, 0 to 5
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=5))]
        stars: Option<u8>,

        /// Mark or unmark as favorite
        #[arg(short, long)]
        favorite: Option<bool>,
    },

    /// Run the live path over an image repeatedly until Ctrl+C
    Stream {
        input: PathBuf,

        /// Filter name (default: the configured video filter)
        #[arg(short = 'F', long)]
        filter: Option<String>,

        /// Stop after this many frames (default: run until Ctrl+C)
        #[arg(short, long)]
        frames: Option<u64>,

        /// Frames per second to feed
        #[arg(long, default_value = "30")]
        fps: u32,
    },
}

impl Commands {
    /// Commands that run filters and so may need the GPU
    fn renders(&self) -> bool {
        matches!(self, Commands::Apply { .. } | Commands::Stream { .. })
    }
}

fn parse_filter(name: &str) -> Result<FilterType, Box<dyn std::error::Error>> {
    FilterType::from_name(name)
        .ok_or_else(|| format!("Unknown filter {:?}; see 'framefx list'", name).into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=framefx=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let wants_gpu = !cli.no_gpu && cli.command.renders();
    let context = cli::Context::open(cli.params, cli.ephemeral, wants_gpu)?;

    let result = match cli.command {
        Commands::List { group } => cli::list_filters(&context, group.as_deref()),
        Commands::Apply {
            filter,
            input,
            with,
            output,
            overrides,
        } => cli::apply_filter(
            &context,
            filter.as_deref().map(parse_filter).transpose()?,
            input,
            with,
            output,
            &overrides,
        ),
        Commands::Get { filter, field } => {
            cli::get_parameters(&context, parse_filter(&filter)?, field.as_deref())
        }
        Commands::Set {
            filter,
            field,
            value,
        } => cli::set_parameter(&context, parse_filter(&filter)?, &field, &value),
        Commands::Seed { filter } => {
            let filter = filter.as_deref().map(parse_filter).transpose()?;
            cli::seed(&context, filter)
        }
        Commands::Stats { json } => cli::show_stats(&context, json),
        Commands::ResetStats => cli::reset_stats(&context),
        Commands::Rate {
            filter,
            stars,
            favorite,
        } => cli::rate(&context, parse_filter(&filter)?, stars, favorite),
        Commands::Stream {
            filter,
            input,
            frames,
            fps,
        } => cli::stream(
            &context,
            filter.as_deref().map(parse_filter).transpose()?,
            input,
            frames,
            fps,
        ),
    };
    context.close()?;
    result
}
