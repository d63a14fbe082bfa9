//! In-memory slab rasters and the GDAL primitives operating on them:
//! blank georeferenced canvases, windowed nearest-neighbor warping, feature
//! rasterization and COG encoding.

use anyhow::{Context, Result, bail, ensure};
use gdal::raster::{Buffer, RasterCreationOptions, ResampleAlg, rasterize};
use gdal::spatial_ref::SpatialRef;
use gdal::vector::Geometry;
use gdal::{Dataset, DriverManager};
use orthotiles_core::{GeoRect, PyramidDescriptor, SlabCoord};
use std::{fs, path::Path};

/// Compression of a written COG tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CogCompression {
	/// JPEG quality 90, used for OPI and ortho tiles.
	Jpeg,
	/// Lossless LZW with horizontal predictor, used for graph tiles whose
	/// pixel values are identity colors.
	Lzw,
}

impl CogCompression {
	fn creation_options(self, block_size: u32) -> Vec<String> {
		let mut options = vec![format!("BLOCKSIZE={block_size}"), "RESAMPLING=NEAREST".to_string()];
		match self {
			CogCompression::Jpeg => {
				options.push("COMPRESS=JPEG".to_string());
				options.push("QUALITY=90".to_string());
			}
			CogCompression::Lzw => {
				options.push("COMPRESS=LZW".to_string());
				options.push("PREDICTOR=YES".to_string());
			}
		}
		options
	}
}

/// An 8-bit georeferenced raster covering exactly one slab, held in memory as
/// band-major planes.
pub struct SlabRaster {
	width: usize,
	height: usize,
	bands: usize,
	data: Vec<u8>,
	transform: [f64; 6],
	epsg: u32,
}

impl SlabRaster {
	/// A zeroed canvas for `slab` with 1 or 3 bands, georeferenced on the
	/// slab frame.
	pub fn blank(pyramid: &PyramidDescriptor, slab: &SlabCoord, bands: usize) -> Result<SlabRaster> {
		pyramid.validate()?;
		ensure!(bands == 1 || bands == 3, "slab rasters have 1 or 3 bands, not {bands}");
		let side = pyramid.slab_pixels() as usize;
		Ok(SlabRaster {
			width: side,
			height: side,
			bands,
			data: vec![0; side * side * bands],
			transform: pyramid.slab_transform(slab),
			epsg: pyramid.crs.code,
		})
	}

	/// Read a raster file fully into memory.
	pub fn open(path: &Path) -> Result<SlabRaster> {
		let dataset = Dataset::open(path).with_context(|| format!("opening raster '{}'", path.display()))?;
		SlabRaster::from_dataset(&dataset)
	}

	fn from_dataset(dataset: &Dataset) -> Result<SlabRaster> {
		let (width, height) = dataset.raster_size();
		let bands = dataset.raster_count();
		ensure!(bands >= 1, "raster has no bands");
		let transform = dataset.geo_transform().context("raster has no geo transform")?;
		let mut data = Vec::with_capacity(width * height * bands);
		for index in 1..=bands {
			let band = dataset.rasterband(index)?;
			let buffer = band.read_as::<u8>((0, 0), (width, height), (width, height), None)?;
			data.extend_from_slice(buffer.data());
		}
		Ok(SlabRaster {
			width,
			height,
			bands,
			data,
			transform,
			epsg: 0,
		})
	}

	pub fn width(&self) -> usize {
		self.width
	}

	pub fn height(&self) -> usize {
		self.height
	}

	pub fn bands(&self) -> usize {
		self.bands
	}

	pub fn band(&self, index: usize) -> &[u8] {
		let plane = self.width * self.height;
		&self.data[index * plane..(index + 1) * plane]
	}

	pub fn band_mut(&mut self, index: usize) -> &mut [u8] {
		let plane = self.width * self.height;
		&mut self.data[index * plane..(index + 1) * plane]
	}

	/// World rectangle covered by this raster.
	pub fn rect(&self) -> GeoRect {
		GeoRect::from_geo_transform(&self.transform, self.width, self.height)
	}

	/// Resample `source` into this raster's grid with nearest-neighbor
	/// sampling; this raster's origin and resolution govern the alignment.
	/// Pixels outside the source footprint are left untouched.
	pub fn warp_from(&mut self, source: &Dataset) -> Result<()> {
		let source_transform = source.geo_transform().context("source raster has no geo transform")?;
		let (source_width, source_height) = source.raster_size();
		let source_rect = GeoRect::from_geo_transform(&source_transform, source_width, source_height);
		let target_rect = self.rect();
		if !target_rect.intersects(&source_rect) {
			return Ok(());
		}

		let res = self.transform[1];
		let origin_x = self.transform[0];
		let origin_y = self.transform[3];

		// target pixel window covered by the source footprint
		let x0 = (((source_rect.xmin - origin_x) / res).floor().max(0.0)) as usize;
		let y0 = (((origin_y - source_rect.ymax) / res).floor().max(0.0)) as usize;
		let x1 = ((((source_rect.xmax - origin_x) / res).ceil()) as usize).min(self.width);
		let y1 = ((((origin_y - source_rect.ymin) / res).ceil()) as usize).min(self.height);
		if x0 >= x1 || y0 >= y1 {
			return Ok(());
		}

		// matching source pixel window of that world rectangle
		let window_xmin = origin_x + x0 as f64 * res;
		let window_ymax = origin_y - y0 as f64 * res;
		let sx0 = (((window_xmin - source_transform[0]) / source_transform[1]).round().max(0.0)) as usize;
		let sy0 = (((source_transform[3] - window_ymax) / -source_transform[5]).round().max(0.0)) as usize;
		let sx1 = ((sx0 as f64 + (x1 - x0) as f64 * res / source_transform[1]).round() as usize).min(source_width);
		let sy1 = ((sy0 as f64 + (y1 - y0) as f64 * res / -source_transform[5]).round() as usize).min(source_height);
		if sx0 >= sx1 || sy0 >= sy1 {
			return Ok(());
		}

		let buffer_size = (x1 - x0, y1 - y0);
		let width = self.width;
		for index in 0..self.bands.min(source.raster_count()) {
			let band = source.rasterband(index + 1)?;
			let buffer = band.read_as::<u8>(
				(sx0 as isize, sy0 as isize),
				(sx1 - sx0, sy1 - sy0),
				buffer_size,
				Some(ResampleAlg::NearestNeighbour),
			)?;
			let pixels = buffer.data();
			let plane = self.band_mut(index);
			for row in 0..buffer_size.1 {
				let src_offset = row * buffer_size.0;
				let dst_offset = (y0 + row) * width + x0;
				plane[dst_offset..dst_offset + buffer_size.0].copy_from_slice(&pixels[src_offset..src_offset + buffer_size.0]);
			}
		}
		Ok(())
	}

	fn to_mem_dataset(&self) -> Result<Dataset> {
		let driver = DriverManager::get_driver_by_name("MEM")?;
		let mut dataset = driver.create_with_band_type::<u8, _>("", self.width, self.height, self.bands)?;
		dataset.set_geo_transform(&self.transform)?;
		if self.epsg != 0 {
			dataset.set_spatial_ref(&SpatialRef::from_epsg(self.epsg)?)?;
		}
		for index in 0..self.bands {
			let mut band = dataset.rasterband(index + 1)?;
			let mut buffer = Buffer::new((self.width, self.height), self.band(index).to_vec());
			band.write((0, 0), (self.width, self.height), &mut buffer)?;
		}
		Ok(dataset)
	}

	/// Encode this raster as a Cloud-Optimized GeoTIFF with `block_size`
	/// blocks, creating parent directories on demand.
	pub fn write_cog(&self, path: &Path, block_size: u32, compression: CogCompression) -> Result<()> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).with_context(|| format!("creating directory '{}'", parent.display()))?;
		}
		let source = self.to_mem_dataset()?;
		let driver = DriverManager::get_driver_by_name("COG").context("GDAL has no COG driver")?;
		let options = compression.creation_options(block_size);
		let options = RasterCreationOptions::from_iter(options.iter().map(String::as_str));
		driver
			.create_copy(path, &source, &options)
			.with_context(|| format!("writing COG '{}'", path.display()))?;
		log::trace!("wrote '{}'", path.display());
		Ok(())
	}
}

/// Rasterize `geometries` onto the grid of `slab`: a single-band mask with
/// 255 inside the geometries and 0 outside.
pub fn rasterize_mask(pyramid: &PyramidDescriptor, slab: &SlabCoord, geometries: &[Geometry]) -> Result<Vec<u8>> {
	let side = pyramid.slab_pixels() as usize;
	if geometries.is_empty() {
		return Ok(vec![0; side * side]);
	}
	let driver = DriverManager::get_driver_by_name("MEM")?;
	let mut dataset = driver.create_with_band_type::<u8, _>("", side, side, 1)?;
	dataset.set_geo_transform(&pyramid.slab_transform(slab))?;
	dataset.set_spatial_ref(&SpatialRef::from_epsg(pyramid.crs.code)?)?;
	rasterize(&mut dataset, &[1], geometries, &[255.0], None)?;
	let band = dataset.rasterband(1)?;
	let buffer = band.read_as::<u8>((0, 0), (side, side), (side, side), None)?;
	Ok(buffer.data().to_vec())
}

/// Per-pixel mask (255/0) of the pixels of a 3-band raster equal to `color`.
pub fn equality_mask(raster: &SlabRaster, color: [u8; 3]) -> Result<Vec<u8>> {
	if raster.bands() != 3 {
		bail!("equality mask needs a 3-band raster, got {} band(s)", raster.bands());
	}
	let (red, green, blue) = (raster.band(0), raster.band(1), raster.band(2));
	Ok(
		(0..red.len())
			.map(|i| {
				if red[i] == color[0] && green[i] == color[1] && blue[i] == color[2] {
					255
				} else {
					0
				}
			})
			.collect(),
	)
}

/// Set `value` on every pixel of `band` where the mask is set.
pub fn paint_band(band: &mut [u8], mask: &[u8], value: u8) {
	for (pixel, m) in band.iter_mut().zip(mask) {
		if *m != 0 {
			*pixel = value;
		}
	}
}

/// Overwrite the masked pixels of `ortho` with the corresponding `opi`
/// pixels. Pixels outside the mask keep their previous value, so successive
/// calls with disjoint masks compose without blending.
pub fn composite_band(ortho: &mut [u8], opi: &[u8], mask: &[u8]) {
	for ((pixel, source), m) in ortho.iter_mut().zip(opi).zip(mask) {
		if *m != 0 {
			*pixel = *source;
		}
	}
}

pub fn mask_is_empty(mask: &[u8]) -> bool {
	mask.iter().all(|value| *value == 0)
}
