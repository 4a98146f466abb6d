//! histmill CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hm_store::HistStore;
use hm_templates::{
    run, scale_report, yields_artifact, ChannelFilter, RunConfig, SystematicSpec,
    SystematicsLoader, TemplateLoader, TypeRegistry,
};

#[derive(Parser)]
#[command(name = "histmill")]
#[command(about = "histmill - template aggregation and systematics propagation")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, merge, fit, scale and export templates
    Export {
        /// Input distribution store (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output template store (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Plot names to load
        #[arg(long, required = true, num_args = 1..)]
        plots: Vec<String>,

        /// Folders to look for plots in (default: store root)
        #[arg(long, num_args = 0..)]
        folders: Vec<String>,

        /// Channel allow/deny spec, e.g. "ttbar,zjets,-qcd"
        #[arg(long)]
        channels: Option<String>,

        /// Channels to export; defaults to every loaded channel
        #[arg(long)]
        save_channels: Option<String>,

        /// Systematic source, optionally one-sided, e.g. "jes" or "jes+"
        #[arg(long)]
        systematic: Option<String>,

        /// Fixed-fraction file (JSON {channel: fraction}); disables the fit
        #[arg(long)]
        fractions: Option<PathBuf>,

        /// Extra scale-factor file (JSON {channel: factor})
        #[arg(long)]
        scales: Option<PathBuf>,

        /// Skip the dynamic fraction fit
        #[arg(long)]
        no_fit: bool,

        /// Plot the fraction fit runs on
        #[arg(long, default_value = "/htlep_before_htlep")]
        fit_plot: String,

        /// Prefix for exported template names
        #[arg(long, default_value = "el")]
        theta_prefix: String,
    },

    /// Per-channel yield tables (plot-friendly JSON)
    Yields {
        /// Input distribution store (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Plot names to load
        #[arg(long, required = true, num_args = 1..)]
        plots: Vec<String>,

        /// Channel allow/deny spec
        #[arg(long)]
        channels: Option<String>,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Variant-to-nominal yield ratios for one systematic source
    SystScales {
        /// Input distribution store (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Systematic source, optionally one-sided, e.g. "jes" or "jes+"
        #[arg(long)]
        systematic: String,

        /// Plot to compute ratios on
        #[arg(long, default_value = "/mttbar_after_htlep")]
        plot: String,

        /// Channel allow/deny spec
        #[arg(long)]
        channels: Option<String>,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Export {
            input,
            output,
            plots,
            folders,
            channels,
            save_channels,
            systematic,
            fractions,
            scales,
            no_fit,
            fit_plot,
            theta_prefix,
        } => {
            let use_fitter = !no_fit && fractions.is_none();
            let config = RunConfig {
                input,
                output,
                plots,
                folders,
                channels,
                save_channels,
                systematic,
                fractions,
                scales,
                use_fitter,
                fit_plot,
                theta_prefix,
            };
            let summary = run(&config)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Yields { input, plots, channels, output } => {
            cmd_yields(&input, &plots, channels.as_deref(), output.as_ref())
        }
        Commands::SystScales { input, systematic, plot, channels, output } => {
            cmd_syst_scales(&input, &systematic, &plot, channels.as_deref(), output.as_ref())
        }
        Commands::Version => {
            println!("histmill {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn cmd_yields(
    input: &PathBuf,
    plots: &[String],
    channels: Option<&str>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let registry = TypeRegistry::new();
    let filter = ChannelFilter::from_spec(&registry, channels)?;
    let store = HistStore::open(input)?;

    let paths: Vec<String> = plots.iter().map(|p| format!("/{}", p.trim_start_matches('/'))).collect();
    let loaded = TemplateLoader::new(&registry, filter).load(&store, &paths)?;

    write_json(output, serde_json::to_value(yields_artifact(&loaded))?)
}

fn cmd_syst_scales(
    input: &PathBuf,
    systematic: &str,
    plot: &str,
    channels: Option<&str>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let registry = TypeRegistry::new();
    let filter = ChannelFilter::from_spec(&registry, channels)?;
    let store = HistStore::open(input)?;

    let spec = SystematicSpec::parse(systematic)?;
    let loader = SystematicsLoader::new(&registry, spec, filter.effective(&registry))?;
    let plot = format!("/{}", plot.trim_start_matches('/'));
    let variants = loader.load(&store, &[plot.clone()])?;

    write_json(output, serde_json::to_value(scale_report(&variants, &plot)?)?)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
