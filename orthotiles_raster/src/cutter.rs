//! Cuts one OPI into per-slab COG tiles aligned on the pyramid grid.

use crate::kernel::{CogCompression, SlabRaster};
use anyhow::{Context, Result, ensure};
use gdal::Dataset;
use orthotiles_core::{GeoRect, MetadataStore, PyramidDescriptor, SlabCoord, SlabLimits, SlabWindow};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The source files of one OPI: an RGB raster, an IR raster, or both. The
/// identifying stem is taken from the RGB file when present.
#[derive(Debug, Clone, Default)]
pub struct OpiSource {
	pub rgb: Option<PathBuf>,
	pub ir: Option<PathBuf>,
}

impl OpiSource {
	/// The OPI name: file stem of the primary (RGB, else IR) source.
	pub fn name(&self) -> Result<String> {
		let path = self.primary()?;
		path
			.file_stem()
			.map(|stem| stem.to_string_lossy().into_owned())
			.with_context(|| format!("OPI path '{}' has no file stem", path.display()))
	}

	pub fn primary(&self) -> Result<&Path> {
		self
			.rgb
			.as_deref()
			.or(self.ir.as_deref())
			.context("no input data: neither an RGB nor an IR OPI was given")
	}
}

/// World footprint of a georeferenced image.
pub fn raster_extent(path: &Path) -> Result<GeoRect> {
	let dataset = Dataset::open(path).with_context(|| format!("opening OPI '{}'", path.display()))?;
	let transform = dataset
		.geo_transform()
		.with_context(|| format!("OPI '{}' has no geo transform", path.display()))?;
	let (width, height) = dataset.raster_size();
	Ok(GeoRect::from_geo_transform(&transform, width, height))
}

/// Slab index ranges intersected by the OPI at every slab-aligned level.
pub fn opi_slab_box(pyramid: &PyramidDescriptor, opi: &OpiSource) -> Result<BTreeMap<u32, SlabLimits>> {
	let extent = raster_extent(opi.primary()?)?;
	ensure!(
		extent.intersects(&pyramid.crs.bounding_box),
		"OPI '{}' lies outside the CRS bounding box",
		opi.primary()?.display()
	);
	Ok(pyramid.slab_box(&extent))
}

/// Cut every slab of `window` at `level`, writing one clipped COG per slab
/// and per channel variant present.
pub fn cut_window(store: &MetadataStore, level: u32, window: &SlabWindow, opi: &OpiSource) -> Result<()> {
	let name = opi.name()?;
	for (x, y) in window.iter() {
		let slab = SlabCoord::new(level, x, y);
		if let Some(rgb) = &opi.rgb {
			cut_slab(store, &slab, rgb, &name, false)?;
		}
		if let Some(ir) = &opi.ir {
			cut_slab(store, &slab, ir, &name, true)?;
		}
	}
	Ok(())
}

fn cut_slab(store: &MetadataStore, slab: &SlabCoord, source_path: &Path, name: &str, infrared: bool) -> Result<()> {
	let pyramid = &store.overviews;
	let source = Dataset::open(source_path).with_context(|| format!("opening OPI '{}'", source_path.display()))?;
	let bands = if infrared { 1 } else { 3 };
	let mut raster = SlabRaster::blank(pyramid, slab, bands)?;
	raster.warp_from(&source)?;

	let path = store.opi_tile_path(slab, name, infrared)?;
	raster.write_cog(&path, pyramid.tile_size.square_side()?, CogCompression::Jpeg)?;
	log::debug!("cut '{name}' into '{}'", path.display());
	Ok(())
}
