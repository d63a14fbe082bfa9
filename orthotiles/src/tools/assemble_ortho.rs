use super::WindowArg;
use anyhow::Result;
use orthotiles_core::MetadataStore;
use orthotiles_raster::assembler;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	#[command(flatten)]
	pub window: WindowArg,

	/// cache directory
	#[arg(short, long, value_name = "DIR", default_value = "cache")]
	cache: PathBuf,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let store = MetadataStore::load(&arguments.cache)?;
	let (level, window) = arguments.window.resolve(&store.overviews)?;

	log::info!("assembling ortho at level {level}");
	assembler::assemble_window(&store, level, &window)
}
