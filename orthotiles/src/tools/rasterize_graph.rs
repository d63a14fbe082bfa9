use super::WindowArg;
use anyhow::Result;
use orthotiles_core::MetadataStore;
use orthotiles_raster::graph::GraphSource;
use orthotiles_raster::rasterizer;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// GeoPackage filename or database connection string
	/// ("PG:host=localhost user=postgres password=postgres dbname=demo")
	#[arg(short, long, value_name = "SOURCE")]
	graph: String,

	/// graph table
	#[arg(short, long, value_name = "TABLE", default_value = "graphe_pcrs56_zone_test")]
	table: String,

	#[command(flatten)]
	pub window: WindowArg,

	/// cache directory
	#[arg(short, long, value_name = "DIR", default_value = "cache")]
	cache: PathBuf,

	/// allow an input graph without DATE/HEURE_TU metadata
	#[arg(short, long)]
	zeromtd: bool,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let store = MetadataStore::load(&arguments.cache)?;
	let (level, window) = arguments.window.resolve(&store.overviews)?;

	let graph = GraphSource::open(&arguments.graph, &arguments.table)?;
	if !arguments.zeromtd {
		graph.require_metadata()?;
	}

	log::info!("rasterizing graph at level {level}");
	rasterizer::rasterize_window(&store, &graph, level, &window)
}
