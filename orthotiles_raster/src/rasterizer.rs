//! Rasterizes the seam graph of one slab into a 3-band image where each
//! pixel carries the identity color of the OPI owning it. Background pixels
//! stay `[0, 0, 0]`.

use crate::graph::GraphSource;
use crate::kernel::{CogCompression, SlabRaster, mask_is_empty, paint_band, rasterize_mask};
use anyhow::Result;
use orthotiles_core::{MetadataStore, SlabCoord, SlabWindow};
use std::collections::HashSet;

/// Rasterize every slab of `window` at `level`.
pub fn rasterize_window(store: &MetadataStore, graph: &GraphSource, level: u32, window: &SlabWindow) -> Result<()> {
	for (x, y) in window.iter() {
		rasterize_slab(store, graph, &SlabCoord::new(level, x, y))?;
	}
	Ok(())
}

/// Rasterize the graph of one slab. Returns whether a tile was written; a
/// slab no feature intersects produces no file.
///
/// Features sharing a `cliche` share a color, so each `cliche` is painted
/// once whatever the feature order; with disjoint polygons the result is
/// order-independent.
pub fn rasterize_slab(store: &MetadataStore, graph: &GraphSource, slab: &SlabCoord) -> Result<bool> {
	let pyramid = &store.overviews;
	let rect = pyramid.slab_rect(slab);
	let features = graph.features_in(Some(&rect), false)?;

	let mut canvas = SlabRaster::blank(pyramid, slab, 3)?;
	let mut painted = false;
	let mut seen = HashSet::new();
	for feature in features {
		if !seen.insert(feature.cliche.clone()) {
			continue;
		}
		let Some(color) = store.opi_color(&feature.cliche) else {
			log::warn!("cliche '{}' has no OPI entry, leaving its area black", feature.cliche);
			continue;
		};
		let geometries = graph.cliche_geometries(&feature.cliche, &rect)?;
		let mask = rasterize_mask(pyramid, slab, &geometries)?;
		if mask_is_empty(&mask) {
			continue;
		}
		painted = true;
		for channel in 0..3 {
			paint_band(canvas.band_mut(channel), &mask, color[channel]);
		}
	}

	if painted {
		let path = store.graph_tile_path(slab)?;
		canvas.write_cog(&path, pyramid.tile_size.square_side()?, CogCompression::Lzw)?;
		log::debug!("rasterized graph slab {slab} to '{}'", path.display());
	} else {
		log::trace!("graph slab {slab} is empty, no tile written");
	}
	Ok(painted)
}
