//! Command line entry point

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gv_core::LocationId;

mod commands;
mod config;
mod sample_db;

use commands::{print_json, render, Selection, Session};
use config::{Overrides, VisConfig};
use sample_db::{create_sample_database, SampleOptions};

/// Query value cubes stored in SQLite and render them as colored maps,
/// legends and charts
#[derive(Parser)]
#[command(name = "gridvis")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect dimensional datasets the way the map views draw them", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite dataset to open; replaces the configured data sources
    #[arg(short, long, global = true)]
    data_source: Option<PathBuf>,

    /// Digits after the decimal point in legend labels
    #[arg(long, global = true)]
    fraction_digits: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample dataset
    SampleDb {
        path: PathBuf,
        #[arg(long, default_value_t = 25)]
        locations: i64,
        #[arg(long, default_value_t = 42)]
        seed: u32,
    },
    /// List the variables of the data source and their dimensions
    Variables,
    /// Print the legend of a variable
    Legend(ViewArgs),
    /// Print the fill and border of every location
    Colors(ViewArgs),
    /// Print a variable along one dimension
    Chart {
        #[command(flatten)]
        view: ViewArgs,
        /// Dimension on the x axis
        #[arg(long)]
        along: String,
        /// Locations to plot
        #[arg(long = "location")]
        locations: Vec<LocationId>,
        /// One line per variable at a single location
        #[arg(long)]
        per_variable: bool,
    },
}

#[derive(Args, Debug, Clone)]
struct ViewArgs {
    /// Variable name; defaults to the configured or first variable
    #[arg(short, long)]
    variable: Option<String>,
    /// Coordinate as `dimension=index`
    #[arg(long = "at", value_parser = parse_coordinate)]
    coordinates: Vec<(String, i64)>,
    /// Selected location
    #[arg(long)]
    select: Option<LocationId>,
    /// Pinned location as `id` or `id:color`
    #[arg(long = "pin", value_parser = parse_pin)]
    pins: Vec<(LocationId, Option<String>)>,
}

impl ViewArgs {
    fn selection(&self) -> Selection {
        Selection {
            coordinates: self.coordinates.clone(),
            selected: self.select,
            pins: self.pins.clone(),
        }
    }
}

fn parse_coordinate(arg: &str) -> Result<(String, i64)> {
    let (name, index) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected dimension=index, got {arg}"))?;
    let index = index
        .trim()
        .parse()
        .with_context(|| format!("invalid coordinate in {arg}"))?;
    Ok((name.trim().to_string(), index))
}

fn parse_pin(arg: &str) -> Result<(LocationId, Option<String>)> {
    let (id, color) = match arg.split_once(':') {
        Some((id, color)) => (id, Some(color.to_string())),
        None => (arg, None),
    };
    let id = id.trim().parse().with_context(|| format!("invalid location id in {arg}"))?;
    Ok((id, color))
}

fn load_config(cli: &Cli) -> Result<VisConfig> {
    let config = match &cli.config {
        Some(path) => VisConfig::load(path)?,
        None => VisConfig::default(),
    };
    Ok(Overrides {
        data_sources: cli.data_source.iter().cloned().collect(),
        fraction_digits: cli.fraction_digits,
    }
    .apply(config))
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let data_source = cli.data_source.as_ref().map(|path| path.display().to_string());
    let data_source = data_source.as_deref();
    match cli.command {
        Commands::SampleDb {
            path,
            locations,
            seed,
        } => create_sample_database(&path, SampleOptions { locations, seed }),
        Commands::Variables => {
            let session = Session::open(config, data_source, None).await?;
            print_json(&session.variables().unwrap_or_default())
        }
        Commands::Legend(view) => {
            let session = Session::open(config, data_source, view.variable.as_deref()).await?;
            let state = session.select(&view.selection())?;
            let mut legend = session.legend();
            render(&mut legend, &state).await?;
            print_json(legend.model())
        }
        Commands::Colors(view) => {
            let session = Session::open(config, data_source, view.variable.as_deref()).await?;
            let state = session.select(&view.selection())?;
            let mut layer = session.value_layer();
            render(&mut layer, &state).await?;
            print_json(&layer.styles())
        }
        Commands::Chart {
            view,
            along,
            locations,
            per_variable,
        } => {
            let session = Session::open(config, data_source, view.variable.as_deref()).await?;
            let state = session.select(&view.selection())?;
            let mut chart = session.line_chart(&along, &locations, per_variable)?;
            render(&mut chart, &state).await?;
            print_json(chart.model())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Starting gridvis");
    run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate("month=3").unwrap(), ("month".to_string(), 3));
        assert_eq!(parse_coordinate(" depth = 0").unwrap(), ("depth".to_string(), 0));
        assert!(parse_coordinate("month").is_err());
        assert!(parse_coordinate("month=x").is_err());
    }

    #[test]
    fn test_parse_pin() {
        assert_eq!(parse_pin("4").unwrap(), (4, None));
        assert_eq!(parse_pin("4:#00ff00").unwrap(), (4, Some("#00ff00".to_string())));
        assert!(parse_pin("x:red").is_err());
    }

    #[test]
    fn test_cli_parses_chart() {
        let cli = Cli::try_parse_from([
            "gridvis", "-d", "data.db", "chart", "--along", "month", "--location", "1",
            "--location", "2", "--at", "depth=1",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.data_sources, vec!["data.db"]);
        match cli.command {
            Commands::Chart {
                view,
                along,
                locations,
                per_variable,
            } => {
                assert_eq!(along, "month");
                assert_eq!(locations, vec![1, 2]);
                assert!(!per_variable);
                assert_eq!(view.coordinates, vec![("depth".to_string(), 1)]);
            }
            _ => panic!("expected chart command"),
        }
    }
}
