use super::{CornerRect, GeoRect, GridSize, SlabLimits, TileLimits};
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

/// Spatial reference of the pyramid: EPSG authority code plus the world
/// bounding box anchoring tile `(0, 0)` at the upper-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
	pub code: u32,
	#[serde(rename = "boundingBox")]
	pub bounding_box: GeoRect,
}

/// Inclusive level interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRange {
	pub min: u32,
	pub max: u32,
}

/// Per-OPI metadata kept in `list_OPI`: the identifying color plus
/// acquisition date/time and which channel variants exist on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpiEntry {
	pub color: [u8; 3],
	pub date: String,
	pub time_ut: String,
	pub with_rgb: bool,
	pub with_ir: bool,
}

/// The extent actually materialized in this cache: covered world rectangle,
/// per-level tile limits and per-slab-aligned-level slab limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
	#[serde(rename = "boundingBox", skip_serializing_if = "Option::is_none")]
	pub bounding_box: Option<CornerRect>,
	pub limits: BTreeMap<u32, TileLimits>,
	#[serde(rename = "slabLimits")]
	pub slab_limits: BTreeMap<u32, SlabLimits>,
	pub level: LevelRange,
}

/// The overviews descriptor: pyramid definition, materialized extent and the
/// OPI list. Persisted as `overviews.json` at the cache root and immutable
/// during worker execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyramidDescriptor {
	pub crs: Crs,
	/// World units per pixel at `level.max`.
	pub resolution: f64,
	pub level: LevelRange,
	#[serde(rename = "tileSize")]
	pub tile_size: GridSize,
	#[serde(rename = "slabSize")]
	pub slab_size: GridSize,
	#[serde(rename = "pathDepth")]
	pub path_depth: u32,
	#[serde(rename = "dataSet")]
	pub data_set: DataSet,
	#[serde(rename = "list_OPI")]
	pub list_opi: BTreeMap<String, OpiEntry>,
}

/// The pyramid parameters of a descriptor template, without the dataset
/// state. Used to seed a fresh cache.
#[derive(Debug, Clone, Deserialize)]
pub struct PyramidTemplate {
	pub crs: Crs,
	pub resolution: f64,
	pub level: LevelRange,
	#[serde(rename = "tileSize")]
	pub tile_size: GridSize,
	#[serde(rename = "slabSize")]
	pub slab_size: GridSize,
	#[serde(rename = "pathDepth")]
	pub path_depth: u32,
}

impl PyramidDescriptor {
	/// Seed a descriptor from a template: empty OPI list, empty limits, the
	/// dataset level interval copied from the pyramid definition.
	pub fn from_template(template: PyramidTemplate) -> Result<PyramidDescriptor> {
		let descriptor = PyramidDescriptor {
			data_set: DataSet {
				bounding_box: None,
				limits: BTreeMap::new(),
				slab_limits: BTreeMap::new(),
				level: template.level,
			},
			crs: template.crs,
			resolution: template.resolution,
			level: template.level,
			tile_size: template.tile_size,
			slab_size: template.slab_size,
			path_depth: template.path_depth,
			list_opi: BTreeMap::new(),
		};
		descriptor.validate()?;
		Ok(descriptor)
	}

	pub fn read_template(path: &Path) -> Result<PyramidTemplate> {
		let text = fs::read_to_string(path).with_context(|| format!("reading overviews template '{}'", path.display()))?;
		serde_json::from_str(&text).with_context(|| format!("parsing overviews template '{}'", path.display()))
	}

	/// Check the geometric contract: square tiles, square power-of-two slabs
	/// and a non-empty level interval.
	pub fn validate(&self) -> Result<()> {
		let tile = self.tile_size.square_side().context("tileSize")?;
		let slab = self.slab_size.square_side().context("slabSize")?;
		ensure!(tile > 0, "tileSize must be positive");
		ensure!(slab.is_power_of_two(), "slabSize ({slab}) must be a power of two");
		ensure!(
			self.level.min <= self.level.max,
			"level.min ({}) must not exceed level.max ({})",
			self.level.min,
			self.level.max
		);
		Ok(())
	}

	/// Pixel width of one slab (tile pixels times slab tiles). Square by
	/// construction, see [`validate`](Self::validate).
	pub fn slab_pixels(&self) -> u32 {
		self.tile_size.width * self.slab_size.width
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn test_descriptor() -> PyramidDescriptor {
		PyramidDescriptor::from_template(
			serde_json::from_value(serde_json::json!({
				"crs": { "code": 2154, "boundingBox": { "xmin": 0.0, "ymin": 0.0, "xmax": 1000.0, "ymax": 1000.0 } },
				"resolution": 0.05,
				"level": { "min": 21, "max": 21 },
				"tileSize": { "width": 256, "height": 256 },
				"slabSize": { "width": 16, "height": 16 },
				"pathDepth": 1
			}))
			.unwrap(),
		)
		.unwrap()
	}

	#[test]
	fn template_seeds_empty_dataset() {
		let descriptor = test_descriptor();
		assert!(descriptor.list_opi.is_empty());
		assert!(descriptor.data_set.limits.is_empty());
		assert_eq!(descriptor.data_set.level, LevelRange { min: 21, max: 21 });
		assert_eq!(descriptor.slab_pixels(), 4096);
	}

	#[test]
	fn validation_rejects_bad_sizes() {
		let mut descriptor = test_descriptor();
		descriptor.tile_size = GridSize::new(256, 128);
		assert!(descriptor.validate().is_err());

		let mut descriptor = test_descriptor();
		descriptor.slab_size = GridSize::new(12, 12);
		assert!(descriptor.validate().is_err());
	}

	#[test]
	fn json_round_trip_keeps_schema_names() {
		let mut descriptor = test_descriptor();
		descriptor.list_opi.insert(
			"opi_A".to_string(),
			OpiEntry {
				color: [10, 20, 30],
				date: "2024-05-01".to_string(),
				time_ut: "10:30".to_string(),
				with_rgb: true,
				with_ir: false,
			},
		);
		descriptor.data_set.limits.insert(
			21,
			TileLimits {
				col_min: 0,
				row_min: 0,
				col_max: 15,
				row_max: 15,
			},
		);

		let json = serde_json::to_value(&descriptor).unwrap();
		assert!(json.get("list_OPI").is_some());
		assert!(json.get("tileSize").is_some());
		assert!(json.get("pathDepth").is_some());
		assert!(json["dataSet"]["limits"]["21"].get("MinTileCol").is_some());

		let back: PyramidDescriptor = serde_json::from_value(json).unwrap();
		assert_eq!(back, descriptor);
	}
}
