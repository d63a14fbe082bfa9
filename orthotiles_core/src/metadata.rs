//! Loading and persisting the cache metadata pair: the overviews descriptor
//! (`overviews.json`) and the color registry (`cache_mtd.json`).
//!
//! The planner is the only writer. Workers load both files at job start and
//! treat them as immutable.

use crate::registry::{ColorRegistry, OpiColor};
use crate::types::{OpiEntry, PyramidDescriptor, SlabCoord};
use anyhow::{Context, Result, ensure};
use rand::Rng;
use std::{
	fs,
	path::{Path, PathBuf},
};

pub const OVERVIEWS_FILE: &str = "overviews.json";
pub const COLOR_FILE: &str = "cache_mtd.json";

/// The on-disk metadata of one cache directory.
#[derive(Debug, Clone)]
pub struct MetadataStore {
	pub cache_dir: PathBuf,
	pub overviews: PyramidDescriptor,
	pub colors: ColorRegistry,
}

impl MetadataStore {
	/// Seed the metadata for a cache about to be created. The cache
	/// directory must not pre-exist; nothing is written until
	/// [`save`](Self::save).
	pub fn init(cache_dir: &Path, template_path: &Path) -> Result<MetadataStore> {
		ensure!(
			!cache_dir.exists(),
			"cache ({}) already in use",
			cache_dir.display()
		);
		let template = PyramidDescriptor::read_template(template_path)?;
		Ok(MetadataStore {
			cache_dir: cache_dir.to_path_buf(),
			overviews: PyramidDescriptor::from_template(template)?,
			colors: ColorRegistry::new(),
		})
	}

	/// Load the metadata of an existing cache. A missing color file is
	/// treated as an empty registry.
	pub fn load(cache_dir: &Path) -> Result<MetadataStore> {
		ensure!(
			cache_dir.is_dir(),
			"cache '{}' doesn't exist",
			cache_dir.display()
		);
		let overviews_path = cache_dir.join(OVERVIEWS_FILE);
		let text = fs::read_to_string(&overviews_path)
			.with_context(|| format!("reading '{}'", overviews_path.display()))?;
		let overviews: PyramidDescriptor =
			serde_json::from_str(&text).with_context(|| format!("parsing '{}'", overviews_path.display()))?;
		overviews.validate()?;

		let color_path = cache_dir.join(COLOR_FILE);
		let colors = if color_path.is_file() {
			let text = fs::read_to_string(&color_path).with_context(|| format!("reading '{}'", color_path.display()))?;
			serde_json::from_str(&text).with_context(|| format!("parsing '{}'", color_path.display()))?
		} else {
			ColorRegistry::new()
		};

		Ok(MetadataStore {
			cache_dir: cache_dir.to_path_buf(),
			overviews,
			colors,
		})
	}

	/// Write both metadata files, creating the cache directory if needed.
	pub fn save(&self) -> Result<()> {
		fs::create_dir_all(&self.cache_dir)
			.with_context(|| format!("creating cache directory '{}'", self.cache_dir.display()))?;
		let overviews_path = self.cache_dir.join(OVERVIEWS_FILE);
		fs::write(&overviews_path, serde_json::to_string(&self.overviews)?)
			.with_context(|| format!("writing '{}'", overviews_path.display()))?;
		let color_path = self.cache_dir.join(COLOR_FILE);
		fs::write(&color_path, serde_json::to_string(&self.colors)?)
			.with_context(|| format!("writing '{}'", color_path.display()))?;
		log::info!(
			"saved metadata for {} OPI(s) to '{}'",
			self.overviews.list_opi.len(),
			self.cache_dir.display()
		);
		Ok(())
	}

	/// Register one OPI: assign (or reuse) its color and record its entry in
	/// `list_OPI`, keeping both indexes consistent.
	pub fn register_opi(
		&mut self,
		name: &str,
		date: String,
		time_ut: String,
		with_rgb: bool,
		with_ir: bool,
		rng: &mut impl Rng,
	) -> OpiColor {
		let color = self.colors.assign_color(name, rng);
		self.overviews.list_opi.insert(
			name.to_string(),
			OpiEntry {
				color,
				date,
				time_ut,
				with_rgb,
				with_ir,
			},
		);
		color
	}

	/// Identity color of `name`, if registered.
	pub fn opi_color(&self, name: &str) -> Option<OpiColor> {
		self.overviews.list_opi.get(name).map(|entry| entry.color)
	}

	// --- cache layout -------------------------------------------------------
	//
	// opi/<level>/<slab_path>_<stem>.tif      clipped OPI (suffix `_ir` for
	//                                         the infrared variant)
	// graph/<level>/<slab_path>.tif           colored graph
	// ortho/<level>/<slab_path>.tif[i]        assembled ortho (RGB / IR)

	/// Path of the clipped tile of OPI `stem` in `slab`.
	pub fn opi_tile_path(&self, slab: &SlabCoord, stem: &str, infrared: bool) -> Result<PathBuf> {
		let slab_path = slab.path(self.overviews.path_depth)?;
		let suffix = if infrared { "_ir" } else { "" };
		Ok(
			self
				.cache_dir
				.join("opi")
				.join(slab.level.to_string())
				.join(format!("{slab_path}_{stem}{suffix}.tif")),
		)
	}

	/// Path of the colored graph tile of `slab`.
	pub fn graph_tile_path(&self, slab: &SlabCoord) -> Result<PathBuf> {
		let slab_path = slab.path(self.overviews.path_depth)?;
		Ok(
			self
				.cache_dir
				.join("graph")
				.join(slab.level.to_string())
				.join(format!("{slab_path}.tif")),
		)
	}

	/// Path of the assembled ortho tile of `slab`. The IR variant carries an
	/// `i` suffix before the extension.
	pub fn ortho_tile_path(&self, slab: &SlabCoord, infrared: bool) -> Result<PathBuf> {
		let slab_path = slab.path(self.overviews.path_depth)?;
		let suffix = if infrared { "i" } else { "" };
		Ok(
			self
				.cache_dir
				.join("ortho")
				.join(slab.level.to_string())
				.join(format!("{slab_path}{suffix}.tif")),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use assert_fs::TempDir;
	use rand::{SeedableRng, rngs::StdRng};

	fn write_template(dir: &Path) -> PathBuf {
		let path = dir.join("template.json");
		fs::write(
			&path,
			r#"{
				"crs": { "code": 2154, "boundingBox": { "xmin": 0.0, "ymin": 0.0, "xmax": 1000.0, "ymax": 1000.0 } },
				"resolution": 0.05,
				"level": { "min": 21, "max": 21 },
				"tileSize": { "width": 256, "height": 256 },
				"slabSize": { "width": 16, "height": 16 },
				"pathDepth": 1
			}"#,
		)
		.unwrap();
		path
	}

	#[test]
	fn init_refuses_existing_cache() {
		let temp = TempDir::new().unwrap();
		let template = write_template(temp.path());
		let cache = temp.path().join("cache");
		fs::create_dir(&cache).unwrap();
		let err = MetadataStore::init(&cache, &template).unwrap_err();
		assert!(err.to_string().contains("already in use"));
	}

	#[test]
	fn save_and_load_round_trip() {
		let temp = TempDir::new().unwrap();
		let template = write_template(temp.path());
		let cache = temp.path().join("cache");

		let mut rng = StdRng::seed_from_u64(1);
		let mut store = MetadataStore::init(&cache, &template).unwrap();
		let color = store.register_opi(
			"opi_A",
			"2024-05-01".to_string(),
			"10:30".to_string(),
			true,
			false,
			&mut rng,
		);
		store.save().unwrap();

		let loaded = MetadataStore::load(&cache).unwrap();
		assert_eq!(loaded.overviews, store.overviews);
		assert_eq!(loaded.colors.lookup_by_name("opi_A"), Some(color));
		assert_eq!(loaded.colors.lookup_by_color(color), Some("opi_A"));
		assert_eq!(loaded.opi_color("opi_A"), Some(color));
	}

	#[test]
	fn missing_color_file_is_empty_registry() {
		let temp = TempDir::new().unwrap();
		let template = write_template(temp.path());
		let cache = temp.path().join("cache");

		let store = MetadataStore::init(&cache, &template).unwrap();
		store.save().unwrap();
		fs::remove_file(cache.join(COLOR_FILE)).unwrap();

		let loaded = MetadataStore::load(&cache).unwrap();
		assert!(loaded.colors.is_empty());
	}

	#[test]
	fn load_requires_cache_directory() {
		let temp = TempDir::new().unwrap();
		assert!(MetadataStore::load(&temp.path().join("nope")).is_err());
	}

	#[test]
	fn tile_paths_follow_the_cache_layout() {
		let temp = TempDir::new().unwrap();
		let template = write_template(temp.path());
		let store = MetadataStore::init(&temp.path().join("cache"), &template).unwrap();

		let slab = SlabCoord::new(21, 0, 0);
		let base = temp.path().join("cache");
		assert_eq!(
			store.opi_tile_path(&slab, "opi_A", false).unwrap(),
			base.join("opi/21/00/00_opi_A.tif")
		);
		assert_eq!(
			store.opi_tile_path(&slab, "opi_A", true).unwrap(),
			base.join("opi/21/00/00_opi_A_ir.tif")
		);
		assert_eq!(store.graph_tile_path(&slab).unwrap(), base.join("graph/21/00/00.tif"));
		assert_eq!(store.ortho_tile_path(&slab, false).unwrap(), base.join("ortho/21/00/00.tif"));
		assert_eq!(store.ortho_tile_path(&slab, true).unwrap(), base.join("ortho/21/00/00i.tif"));
	}
}
