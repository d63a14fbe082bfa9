use super::opis::{cut_jobs, worker_program};
use crate::pool;
use anyhow::{Result, ensure};
use orthotiles_core::MetadataStore;
use orthotiles_core::jobs::JobDag;
use orthotiles_raster::cutter::OpiSource;
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

	/// cache directory
	#[arg(short, long, value_name = "DIR", default_value = "cache")]
	cache: PathBuf,

	/// number of processing units to allocate (default: host CPUs - 1)
	#[arg(short, long, value_name = "COUNT")]
	processors: Option<usize>,

	/// launch the jobs locally (default: 0, only the DAG file is written)
	#[arg(short, long, value_name = "0|1", default_value_t = 0)]
	running: u8,

	/// size of the processed subareas, in slabs
	#[arg(short, long, value_name = "SLABS", default_value_t = 2)]
	subsize: u32,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	ensure!(arguments.subsize >= 1, "subsize must be equal or greater than 1");

	let store = MetadataStore::load(&arguments.cache)?;
	let opi = OpiSource {
		rgb: arguments.rgb.clone(),
		ir: arguments.ir.clone(),
	};
	let name = opi.name()?;

	let jobs = cut_jobs(&store, &opi, arguments.subsize, &worker_program())?;
	if arguments.running == 0 {
		let mut dag = JobDag::new();
		dag.push_project(format!("cut_{name}"), jobs, &[]);
		let dag_path = store.cache_dir.join(format!("cut_{name}.json"));
		dag.save(&dag_path)?;
		log::info!("cutting DAG written to '{}'", dag_path.display());
	} else {
		let processors = arguments.processors.unwrap_or_else(pool::default_processors);
		pool::run_jobs(&jobs, processors, &format!("cutting {name}"))?;
	}
	Ok(())
}
