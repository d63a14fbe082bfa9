use super::opis::{OpiInventory, cut_jobs, worker_program};
use crate::pool;
use anyhow::{Result, ensure};
use orthotiles_core::MetadataStore;
use orthotiles_core::jobs::{CommandLine, Job, JobDag};
use orthotiles_raster::graph::{GraphSource, checked_date, checked_time_ut};
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// input RGB OPI path or pattern (`*`/`?` wildcards)
	#[arg(short = 'R', long, value_name = "PATTERN")]
	rgb: Option<String>,

	/// input IR OPI path or pattern
	#[arg(short = 'I', long, value_name = "PATTERN")]
	ir: Option<String>,

	/// cache directory, must not pre-exist
	#[arg(short, long, value_name = "DIR", default_value = "cache")]
	cache: PathBuf,

	/// overviews template for the mosaic
	#[arg(short, long, value_name = "FILE", default_value = "ressources/RGF93_LA93_5cm.json")]
	overviews: PathBuf,

	/// GeoPackage filename or database connection string
	/// ("PG:host=localhost user=postgres password=postgres dbname=demo")
	#[arg(short, long, value_name = "SOURCE")]
	graph: String,

	/// graph table
	#[arg(short, long, value_name = "TABLE", default_value = "graphe_pcrs56_zone_test")]
	table: String,

	/// number of processing units to allocate (default: host CPUs - 1)
	#[arg(short, long, value_name = "COUNT")]
	processors: Option<usize>,

	/// launch the jobs locally (default: 0, only the DAG files are written)
	#[arg(short, long, value_name = "0|1", default_value_t = 0)]
	running: u8,

	/// size of the processed subareas, in slabs
	#[arg(short, long, value_name = "SLABS", default_value_t = 2)]
	subsize: u32,

	/// allow an input graph without DATE/HEURE_TU metadata
	#[arg(short, long)]
	zeromtd: bool,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	ensure!(arguments.subsize >= 1, "subsize must be equal or greater than 1");

	let graph = GraphSource::open(&arguments.graph, &arguments.table)?;
	if !arguments.zeromtd {
		graph.require_metadata()?;
	}

	let mut store = MetadataStore::init(&arguments.cache, &arguments.overviews)?;
	let inventory = OpiInventory::from_patterns(arguments.rgb.as_deref(), arguments.ir.as_deref())?;
	ensure!(!inventory.is_empty(), "no input data: no OPI matches the given patterns");

	let extent = graph.extent()?;
	store.overviews.set_limits(&extent);
	log::info!(
		"graph extent [{}, {}] x [{}, {}]",
		extent.xmin,
		extent.xmax,
		extent.ymin,
		extent.ymax
	);

	// every cliche of the graph gets a stable identity color, whether or not
	// an input file backs it
	let mut rng = rand::rng();
	for feature in graph.features_in(None, !arguments.zeromtd)? {
		let (date, time_ut) = if arguments.zeromtd {
			("1900-01-01".to_string(), "00:00".to_string())
		} else {
			(
				checked_date(feature.date.as_deref())?,
				checked_time_ut(feature.time_ut.as_deref())?,
			)
		};
		let with_rgb = inventory.has_rgb(&feature.cliche);
		let with_ir = inventory.has_ir(&feature.cliche);
		store.register_opi(&feature.cliche, date, time_ut, with_rgb, with_ir, &mut rng);
	}
	store.save()?;

	let dag = build_dag(&store, &inventory, arguments)?;
	let dag_path = store.cache_dir.join("create.json");
	dag.save(&dag_path)?;
	log::info!("job DAG written to '{}'", dag_path.display());

	if arguments.running != 0 {
		let processors = arguments.processors.unwrap_or_else(pool::default_processors);
		for project in &dag.projects {
			pool::run_jobs(&project.jobs, processors, &project.name)?;
		}
	}
	Ok(())
}

/// The three-stage DAG: all cutting first, then graph rasterization, then
/// ortho assembly.
fn build_dag(store: &MetadataStore, inventory: &OpiInventory, arguments: &Subcommand) -> Result<JobDag> {
	let program = worker_program();
	let mut dag = JobDag::new();

	let mut jobs = Vec::new();
	for opi in inventory.sources() {
		jobs.extend(cut_jobs(store, &opi, arguments.subsize, &program)?);
	}
	let cut_id = dag.push_project("cut_opi", jobs, &[]);

	let graph_extra = [
		"-g".to_string(),
		arguments.graph.clone(),
		"-t".to_string(),
		arguments.table.clone(),
		"-z".to_string(),
	];
	let graph_jobs = window_jobs(store, "rasterize-graph", &graph_extra, arguments.subsize, &program);
	let graph_id = dag.push_project("rasterize_graph", graph_jobs, &[cut_id]);

	let ortho_jobs = window_jobs(store, "assemble-ortho", &[], arguments.subsize, &program);
	dag.push_project("assemble_ortho", ortho_jobs, &[graph_id]);
	Ok(dag)
}

/// One job per `subsize` x `subsize` window of the dataset slab limits, for
/// the given worker subcommand.
fn window_jobs(store: &MetadataStore, subcommand: &str, extra: &[String], subsize: u32, program: &str) -> Vec<Job> {
	let cache = store.cache_dir.display().to_string();
	let mut jobs = Vec::new();
	for (level, limits) in &store.overviews.data_set.slab_limits {
		for window in limits.chunks(subsize) {
			let command = CommandLine::new(program)
				.arg(subcommand)
				.arg("-i")
				.arg(level.to_string())
				.arg(window.x_min.to_string())
				.arg(window.y_min.to_string())
				.arg(window.x_max.to_string())
				.arg(window.y_max.to_string())
				.arg("-c")
				.arg(&cache)
				.args(extra.iter().cloned());
			jobs.push(Job {
				name: format!("{level}_{}_{}", window.x_min, window.y_min),
				command,
			});
		}
	}
	jobs
}
