//! OPI file inventory: expands the RGB/IR input patterns, pairs both channel
//! variants by file stem and builds the cutting jobs of each OPI.

use anyhow::{Context, Result, ensure};
use orthotiles_core::MetadataStore;
use orthotiles_core::jobs::{CommandLine, Job};
use orthotiles_raster::cutter::{self, OpiSource};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use wildmatch::WildMatch;

/// Program to put in emitted job commands: this very binary.
pub fn worker_program() -> String {
	std::env::current_exe()
		.map(|path| path.display().to_string())
		.unwrap_or_else(|_| "orthotiles".to_string())
}

/// Expand a file path that may carry `*`/`?` wildcards in its file name.
pub fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
	let path = Path::new(pattern);
	ensure!(!path.is_dir(), "invalid pattern: {pattern}");
	let file_name = path
		.file_name()
		.with_context(|| format!("invalid pattern: {pattern}"))?
		.to_string_lossy()
		.into_owned();

	if !file_name.contains(['*', '?']) {
		ensure!(path.is_file(), "input file '{pattern}' doesn't exist");
		return Ok(vec![path.to_path_buf()]);
	}

	let dir = match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
		_ => PathBuf::from("."),
	};
	let matcher = WildMatch::new(&file_name);
	let mut files = Vec::new();
	for entry in std::fs::read_dir(&dir).with_context(|| format!("listing '{}'", dir.display()))? {
		let entry = entry?;
		if entry.file_type()?.is_file() && matcher.matches(&entry.file_name().to_string_lossy()) {
			files.push(entry.path());
		}
	}
	files.sort();
	Ok(files)
}

fn by_stem(files: Vec<PathBuf>) -> BTreeMap<String, PathBuf> {
	let mut map = BTreeMap::new();
	for file in files {
		let Some(stem) = file.file_stem().map(|stem| stem.to_string_lossy().into_owned()) else {
			continue;
		};
		if let Some(previous) = map.insert(stem.clone(), file) {
			log::warn!("duplicate OPI stem '{stem}', ignoring '{}'", previous.display());
		}
	}
	map
}

/// All OPI input files, keyed by stem and channel variant.
#[derive(Debug, Default)]
pub struct OpiInventory {
	rgb: BTreeMap<String, PathBuf>,
	ir: BTreeMap<String, PathBuf>,
}

impl OpiInventory {
	pub fn from_patterns(rgb: Option<&str>, ir: Option<&str>) -> Result<OpiInventory> {
		let mut inventory = OpiInventory::default();
		if let Some(pattern) = rgb {
			inventory.rgb = by_stem(expand_pattern(pattern)?);
		}
		if let Some(pattern) = ir {
			inventory.ir = by_stem(expand_pattern(pattern)?);
		}
		Ok(inventory)
	}

	pub fn is_empty(&self) -> bool {
		self.rgb.is_empty() && self.ir.is_empty()
	}

	pub fn has_rgb(&self, stem: &str) -> bool {
		self.rgb.contains_key(stem)
	}

	pub fn has_ir(&self, stem: &str) -> bool {
		self.ir.contains_key(stem)
	}

	/// One [`OpiSource`] per distinct stem; an IR file without an RGB partner
	/// forms an IR-only OPI.
	pub fn sources(&self) -> Vec<OpiSource> {
		let mut stems: Vec<&String> = self.rgb.keys().collect();
		stems.extend(self.ir.keys().filter(|stem| !self.rgb.contains_key(*stem)));
		stems.sort();
		stems
			.into_iter()
			.map(|stem| OpiSource {
				rgb: self.rgb.get(stem).cloned(),
				ir: self.ir.get(stem).cloned(),
			})
			.collect()
	}
}

/// Cutting jobs of one OPI: one job per `subsize` x `subsize` window of its
/// slab box, at every slab-aligned level.
pub fn cut_jobs(store: &MetadataStore, opi: &OpiSource, subsize: u32, program: &str) -> Result<Vec<Job>> {
	let name = opi.name()?;
	let cache = store.cache_dir.display().to_string();
	let mut jobs = Vec::new();
	for (level, limits) in cutter::opi_slab_box(&store.overviews, opi)? {
		for window in limits.chunks(subsize) {
			let mut command = CommandLine::new(program)
				.arg("cut-opi")
				.arg("-i")
				.arg(level.to_string())
				.arg(window.x_min.to_string())
				.arg(window.y_min.to_string())
				.arg(window.x_max.to_string())
				.arg(window.y_max.to_string())
				.arg("-c")
				.arg(&cache);
			if let Some(rgb) = &opi.rgb {
				command = command.arg("-R").arg(rgb.display().to_string());
			}
			if let Some(ir) = &opi.ir {
				command = command.arg("-I").arg(ir.display().to_string());
			}
			jobs.push(Job {
				name: format!("{name}_{level}_{}_{}", window.x_min, window.y_min),
				command,
			});
		}
	}
	Ok(jobs)
}

#[cfg(test)]
mod tests {
	use super::*;
	use assert_fs::TempDir;
	use std::fs;

	fn touch(dir: &Path, name: &str) {
		fs::write(dir.join(name), b"").unwrap();
	}

	#[test]
	fn pattern_expansion_and_pairing() {
		let temp = TempDir::new().unwrap();
		touch(temp.path(), "opi_A.tif");
		touch(temp.path(), "opi_B.tif");
		touch(temp.path(), "notes.txt");
		let ir_dir = temp.path().join("ir");
		fs::create_dir(&ir_dir).unwrap();
		touch(&ir_dir, "opi_B.tif");
		touch(&ir_dir, "opi_C.tif");

		let rgb_pattern = format!("{}/*.tif", temp.path().display());
		let ir_pattern = format!("{}/*.tif", ir_dir.display());
		let inventory = OpiInventory::from_patterns(Some(&rgb_pattern), Some(&ir_pattern)).unwrap();

		assert!(inventory.has_rgb("opi_A"));
		assert!(!inventory.has_ir("opi_A"));
		assert!(inventory.has_rgb("opi_B") && inventory.has_ir("opi_B"));
		assert!(!inventory.has_rgb("notes"));

		let sources = inventory.sources();
		let names: Vec<String> = sources.iter().map(|opi| opi.name().unwrap()).collect();
		assert_eq!(names, vec!["opi_A", "opi_B", "opi_C"]);
		assert!(sources[1].rgb.is_some() && sources[1].ir.is_some());
		assert!(sources[2].rgb.is_none() && sources[2].ir.is_some());
	}

	#[test]
	fn literal_path_must_exist() {
		let temp = TempDir::new().unwrap();
		let missing = format!("{}/gone.tif", temp.path().display());
		assert!(expand_pattern(&missing).is_err());

		touch(temp.path(), "here.tif");
		let literal = format!("{}/here.tif", temp.path().display());
		assert_eq!(expand_pattern(&literal).unwrap().len(), 1);
	}

	#[test]
	fn directories_are_invalid_patterns() {
		let temp = TempDir::new().unwrap();
		assert!(expand_pattern(&temp.path().display().to_string()).is_err());
	}
}
