mod pool;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};

// Command-line interface: one planner entry point (`create`, `prep-cut`) and
// one worker entry point per pipeline stage.
#[derive(Parser, Debug)]
#[command(
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<WarnLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Create a cache from a graph and a set of OPIs, emitting the job DAG
	Create(tools::create::Subcommand),

	/// Emit the cutting jobs of a single OPI for an existing cache
	PrepCut(tools::prep_cut::Subcommand),

	/// Cut one OPI into the slabs of a window (worker)
	CutOpi(tools::cut_opi::Subcommand),

	/// Rasterize the graph for a window of slabs (worker)
	RasterizeGraph(tools::rasterize_graph::Subcommand),

	/// Assemble the ortho mosaic for a window of slabs (worker)
	AssembleOrtho(tools::assemble_ortho::Subcommand),
}

fn main() {
	let cli = Cli::parse();

	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	// Workers report their result to the orchestrator through the exit code.
	if let Err(error) = run(&cli) {
		eprintln!("ERROR: {error:#}");
		std::process::exit(1);
	}
}

fn run(cli: &Cli) -> Result<()> {
	match &cli.command {
		Commands::Create(arguments) => tools::create::run(arguments),
		Commands::PrepCut(arguments) => tools::prep_cut::run(arguments),
		Commands::CutOpi(arguments) => tools::cut_opi::run(arguments),
		Commands::RasterizeGraph(arguments) => tools::rasterize_graph::run(arguments),
		Commands::AssembleOrtho(arguments) => tools::assemble_ortho::run(arguments),
	}
}
