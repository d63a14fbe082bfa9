//! Tile geometry: pure arithmetic mapping world rectangles to tile and slab
//! index ranges, and slabs back to their world frames.
//!
//! All divisions are rounded to 8 decimal places before `floor`/`ceil` so
//! that extents landing exactly on a tile edge are not shifted by
//! floating-point noise.

use crate::types::{GeoRect, PyramidDescriptor, SlabCoord, SlabLimits, TileLimits};
use std::collections::BTreeMap;

/// Round to 8 decimal places, the tolerance applied before snapping world
/// coordinates to the tile grid.
fn round8(value: f64) -> f64 {
	(value * 1e8).round() / 1e8
}

fn floor8(value: f64) -> i64 {
	round8(value).floor() as i64
}

fn ceil8(value: f64) -> i64 {
	round8(value).ceil() as i64
}

fn clamp_index(value: i64) -> u32 {
	value.max(0).min(i64::from(u32::MAX)) as u32
}

impl PyramidDescriptor {
	/// World units per pixel at `level`; doubles for each level below
	/// `level.max`.
	pub fn resolution_at(&self, level: u32) -> f64 {
		self.resolution * 2f64.powi(self.level.max as i32 - level as i32)
	}

	/// Number of pyramid levels stored per slab file: `floor(log2(slabSize)) + 1`.
	pub fn nb_level_cog(&self) -> u32 {
		let side = self.slab_size.width.min(self.slab_size.height);
		side.ilog2() + 1
	}

	/// Whether `level` lies on a slab boundary of the pyramid, i.e. slab
	/// limits exist for it.
	pub fn is_slab_aligned(&self, level: u32) -> bool {
		let nb = self.nb_level_cog();
		level % nb == self.data_set.level.max % nb
	}

	/// Tile index range covered by `rect` at `level`.
	pub fn tile_indexes(&self, rect: &GeoRect, level: u32) -> TileLimits {
		let res = self.resolution_at(level);
		let span_x = res * f64::from(self.tile_size.width);
		let span_y = res * f64::from(self.tile_size.height);
		self.indexes(rect, span_x, span_y)
	}

	/// Slab index range covered by `rect` at `level`. Only meaningful for
	/// slab-aligned levels.
	pub fn slab_indexes(&self, rect: &GeoRect, level: u32) -> SlabLimits {
		let res = self.resolution_at(level);
		let span_x = res * f64::from(self.tile_size.width) * f64::from(self.slab_size.width);
		let span_y = res * f64::from(self.tile_size.height) * f64::from(self.slab_size.height);
		let limits = self.indexes(rect, span_x, span_y);
		SlabLimits {
			col_min: limits.col_min,
			row_min: limits.row_min,
			col_max: limits.col_max,
			row_max: limits.row_max,
		}
	}

	fn indexes(&self, rect: &GeoRect, span_x: f64, span_y: f64) -> TileLimits {
		let world = &self.crs.bounding_box;
		TileLimits {
			col_min: clamp_index(floor8((rect.xmin - world.xmin) / span_x)),
			row_min: clamp_index(floor8((world.ymax - rect.ymax) / span_y)),
			col_max: clamp_index(ceil8((rect.xmax - world.xmin) / span_x) - 1),
			row_max: clamp_index(ceil8((world.ymax - rect.ymin) / span_y) - 1),
		}
	}

	/// Slab index ranges of `rect` for every slab-aligned level of the
	/// dataset interval. This is the work space of one OPI or of the whole
	/// graph.
	pub fn slab_box(&self, rect: &GeoRect) -> BTreeMap<u32, SlabLimits> {
		(self.data_set.level.min..=self.data_set.level.max)
			.filter(|level| self.is_slab_aligned(*level))
			.map(|level| (level, self.slab_indexes(rect, level)))
			.collect()
	}

	/// Record `rect` as the dataset extent: bounding box, tile limits for
	/// every dataset level and slab limits for the slab-aligned ones. Already
	/// present limits are widened, so successive calls accumulate coverage.
	pub fn set_limits(&mut self, rect: &GeoRect) {
		self.data_set.bounding_box = Some((*rect).into());
		for level in self.data_set.level.min..=self.data_set.level.max {
			let limits = self.tile_indexes(rect, level);
			self
				.data_set
				.limits
				.entry(level)
				.and_modify(|known| known.merge(&limits))
				.or_insert(limits);
			if self.is_slab_aligned(level) {
				let slab_limits = self.slab_indexes(rect, level);
				self
					.data_set
					.slab_limits
					.entry(level)
					.and_modify(|known| known.merge(&slab_limits))
					.or_insert(slab_limits);
			}
		}
	}

	/// World coordinates of the upper-left pixel of `slab`.
	pub fn slab_origin(&self, slab: &SlabCoord) -> (f64, f64) {
		let res = self.resolution_at(slab.level);
		let world = &self.crs.bounding_box;
		let span_x = res * f64::from(self.tile_size.width) * f64::from(self.slab_size.width);
		let span_y = res * f64::from(self.tile_size.height) * f64::from(self.slab_size.height);
		(
			world.xmin + f64::from(slab.x) * span_x,
			world.ymax - f64::from(slab.y) * span_y,
		)
	}

	/// World rectangle covered by `slab`.
	pub fn slab_rect(&self, slab: &SlabCoord) -> GeoRect {
		let res = self.resolution_at(slab.level);
		let (origin_x, origin_y) = self.slab_origin(slab);
		let span_x = res * f64::from(self.tile_size.width) * f64::from(self.slab_size.width);
		let span_y = res * f64::from(self.tile_size.height) * f64::from(self.slab_size.height);
		GeoRect::new(origin_x, origin_y - span_y, origin_x + span_x, origin_y)
	}

	/// Affine transform of a slab raster, GDAL sextet convention.
	pub fn slab_transform(&self, slab: &SlabCoord) -> [f64; 6] {
		let res = self.resolution_at(slab.level);
		let (origin_x, origin_y) = self.slab_origin(slab);
		[origin_x, res, 0.0, origin_y, 0.0, -res]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{Crs, DataSet, GridSize, LevelRange, PyramidDescriptor};
	use pretty_assertions::assert_eq;
	use rstest::rstest;
	use std::collections::BTreeMap;

	fn descriptor(level_min: u32, level_max: u32) -> PyramidDescriptor {
		PyramidDescriptor {
			crs: Crs {
				code: 2154,
				bounding_box: GeoRect::new(0.0, 0.0, 1000.0, 1000.0),
			},
			resolution: 0.05,
			level: LevelRange {
				min: level_min,
				max: level_max,
			},
			tile_size: GridSize::new(256, 256),
			slab_size: GridSize::new(16, 16),
			path_depth: 1,
			data_set: DataSet {
				bounding_box: None,
				limits: BTreeMap::new(),
				slab_limits: BTreeMap::new(),
				level: LevelRange {
					min: level_min,
					max: level_max,
				},
			},
			list_opi: BTreeMap::new(),
		}
	}

	#[rstest]
	#[case(21, 0.05)]
	#[case(20, 0.1)]
	#[case(19, 0.2)]
	#[case(16, 1.6)]
	fn resolution_doubles_per_level(#[case] level: u32, #[case] expected: f64) {
		let descriptor = descriptor(16, 21);
		assert!((descriptor.resolution_at(level) - expected).abs() < 1e-12);
	}

	#[test]
	fn nb_level_cog_and_alignment() {
		let descriptor = descriptor(12, 21);
		// slabSize 16 -> 5 levels per slab file
		assert_eq!(descriptor.nb_level_cog(), 5);
		assert!(descriptor.is_slab_aligned(21));
		assert!(descriptor.is_slab_aligned(16));
		assert!(!descriptor.is_slab_aligned(20));
	}

	#[test]
	fn one_slab_covers_the_expected_rect() {
		let descriptor = descriptor(21, 21);
		// a slab is 4096 px of 0.05 world units: 204.8 per side
		let rect = GeoRect::new(0.0, 1000.0 - 204.8, 204.8, 1000.0);
		let limits = descriptor.slab_indexes(&rect, 21);
		assert_eq!(
			limits,
			SlabLimits {
				col_min: 0,
				row_min: 0,
				col_max: 0,
				row_max: 0,
			}
		);
	}

	#[test]
	fn slab_rect_inverts_slab_indexes() {
		let descriptor = descriptor(16, 21);
		for (level, x, y) in [(21, 0, 0), (21, 3, 2), (16, 1, 1)] {
			let slab = SlabCoord::new(level, x, y);
			let rect = descriptor.slab_rect(&slab);
			let limits = descriptor.slab_indexes(&rect, level);
			assert_eq!((limits.col_min, limits.row_min, limits.col_max, limits.row_max), (x, y, x, y));
		}
	}

	#[test]
	fn edge_snapping_does_not_bleed_into_neighbors() {
		let descriptor = descriptor(21, 21);
		// 819.2 = 4 slabs exactly; a rect ending on the boundary must not
		// claim slab 4
		let rect = GeoRect::new(0.0, 1000.0 - 819.2, 819.2, 1000.0);
		let limits = descriptor.slab_indexes(&rect, 21);
		assert_eq!(limits.col_max, 3);
		assert_eq!(limits.row_max, 3);
	}

	#[test]
	fn tile_indexes_origin_is_upper_left() {
		let descriptor = descriptor(21, 21);
		// 12.8 world units per tile at level 21
		let rect = GeoRect::new(0.0, 1000.0 - 12.8, 12.8, 1000.0);
		let limits = descriptor.tile_indexes(&rect, 21);
		assert_eq!(
			limits,
			TileLimits {
				col_min: 0,
				row_min: 0,
				col_max: 0,
				row_max: 0,
			}
		);
	}

	#[test]
	fn set_limits_fills_every_level_and_merges() {
		let mut descriptor = descriptor(17, 21);
		descriptor.set_limits(&GeoRect::new(0.0, 900.0, 100.0, 1000.0));
		assert_eq!(descriptor.data_set.limits.len(), 5);
		// only 21 and 16 are slab-aligned in 17..=21, and 16 is outside
		assert_eq!(descriptor.data_set.slab_limits.keys().collect::<Vec<_>>(), vec![&21]);

		let first = descriptor.data_set.limits[&21];
		descriptor.set_limits(&GeoRect::new(300.0, 600.0, 400.0, 700.0));
		let merged = descriptor.data_set.limits[&21];
		assert_eq!(merged.col_min, first.col_min);
		assert!(merged.col_max > first.col_max);
		assert!(merged.row_max > first.row_max);
	}

	#[test]
	fn slab_origin_and_transform() {
		let descriptor = descriptor(21, 21);
		let slab = SlabCoord::new(21, 1, 2);
		let (origin_x, origin_y) = descriptor.slab_origin(&slab);
		assert!((origin_x - 204.8).abs() < 1e-9);
		assert!((origin_y - (1000.0 - 409.6)).abs() < 1e-9);
		let transform = descriptor.slab_transform(&slab);
		assert_eq!(transform[1], 0.05);
		assert_eq!(transform[5], -0.05);
	}
}
