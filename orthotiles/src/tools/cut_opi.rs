use super::WindowArg;
use anyhow::Result;
use orthotiles_core::MetadataStore;
use orthotiles_raster::cutter::{self, OpiSource};
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// input RGB OPI full path
	#[arg(short = 'R', long, value_name = "FILE")]
	rgb: Option<PathBuf>,

	/// input IR OPI full path
	#[arg(short = 'I', long, value_name = "FILE")]
	ir: Option<PathBuf>,

	#[command(flatten)]
	pub window: WindowArg,

	/// cache directory
	#[arg(short, long, value_name = "DIR", default_value = "cache")]
	cache: PathBuf,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let store = MetadataStore::load(&arguments.cache)?;
	let (level, window) = arguments.window.resolve(&store.overviews)?;

	let opi = OpiSource {
		rgb: arguments.rgb.clone(),
		ir: arguments.ir.clone(),
	};
	opi.primary()?;

	log::info!("cutting OPI '{}' at level {level}", opi.name()?);
	cutter::cut_window(&store, level, &window, &opi)
}
