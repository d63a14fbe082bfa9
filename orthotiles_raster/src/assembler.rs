//! Assembles the ortho mosaic of one slab: reads the colored graph tile,
//! matches each registered OPI's identity color against it and copies the
//! masked pixels out of the clipped OPI tiles.

use crate::kernel::{CogCompression, SlabRaster, composite_band, equality_mask, mask_is_empty};
use anyhow::{Context, Result, ensure};
use orthotiles_core::{MetadataStore, SlabCoord, SlabWindow};
use std::collections::BTreeSet;
use std::fs;

/// Assemble every slab of `window` at `level`.
pub fn assemble_window(store: &MetadataStore, level: u32, window: &SlabWindow) -> Result<()> {
	for (x, y) in window.iter() {
		assemble_slab(store, &SlabCoord::new(level, x, y))?;
	}
	Ok(())
}

/// Assemble the ortho of one slab. Returns whether any tile was written; a
/// slab without a graph tile is empty and produces nothing.
pub fn assemble_slab(store: &MetadataStore, slab: &SlabCoord) -> Result<bool> {
	let pyramid = &store.overviews;
	let graph_path = store.graph_tile_path(slab)?;
	if !graph_path.is_file() {
		log::trace!("no graph tile for slab {slab}, skipping");
		return Ok(false);
	}
	let graph = SlabRaster::open(&graph_path)?;
	ensure!(
		graph.bands() == 3,
		"graph tile '{}' has {} band(s), expected 3",
		graph_path.display(),
		graph.bands()
	);

	let mut ortho_rgb: Option<SlabRaster> = None;
	let mut ortho_ir: Option<SlabRaster> = None;

	for stem in candidate_opis(store, slab)? {
		let Some(entry) = pyramid.list_opi.get(&stem) else {
			log::warn!("OPI tile for unknown '{stem}', skipping");
			continue;
		};
		let mask = equality_mask(&graph, entry.color)?;
		if mask_is_empty(&mask) {
			continue;
		}
		if entry.with_rgb {
			let opi = SlabRaster::open(&store.opi_tile_path(slab, &stem, false)?)?;
			if ortho_rgb.is_none() {
				ortho_rgb = Some(SlabRaster::blank(pyramid, slab, 3)?);
			}
			if let Some(ortho) = &mut ortho_rgb {
				for channel in 0..3 {
					composite_band(ortho.band_mut(channel), opi.band(channel), &mask);
				}
			}
		}
		if entry.with_ir {
			let opi = SlabRaster::open(&store.opi_tile_path(slab, &stem, true)?)?;
			if ortho_ir.is_none() {
				ortho_ir = Some(SlabRaster::blank(pyramid, slab, 1)?);
			}
			if let Some(ortho) = &mut ortho_ir {
				composite_band(ortho.band_mut(0), opi.band(0), &mask);
			}
		}
	}

	let block_size = pyramid.tile_size.square_side()?;
	let mut written = false;
	if let Some(ortho) = &ortho_rgb {
		ortho.write_cog(&store.ortho_tile_path(slab, false)?, block_size, CogCompression::Jpeg)?;
		written = true;
	}
	if let Some(ortho) = &ortho_ir {
		ortho.write_cog(&store.ortho_tile_path(slab, true)?, block_size, CogCompression::Jpeg)?;
		written = true;
	}
	if written {
		log::debug!("assembled ortho slab {slab}");
	}
	Ok(written)
}

/// The OPI stems having a clipped tile in `slab`, from the filenames
/// `<leaf>_<stem>.tif` / `<leaf>_<stem>_ir.tif` next to the slab leaf.
fn candidate_opis(store: &MetadataStore, slab: &SlabCoord) -> Result<BTreeSet<String>> {
	// any variant path gives the directory and leaf prefix
	let probe = store.opi_tile_path(slab, "", false)?;
	let dir = probe.parent().context("slab path has no parent")?.to_path_buf();
	let leaf_prefix = probe
		.file_name()
		.map(|name| name.to_string_lossy().trim_end_matches(".tif").to_string())
		.context("slab path has no file name")?;

	let mut stems = BTreeSet::new();
	if !dir.is_dir() {
		return Ok(stems);
	}
	for entry in fs::read_dir(&dir).with_context(|| format!("listing '{}'", dir.display()))? {
		let file_name = entry?.file_name();
		let name = file_name.to_string_lossy();
		let Some(stem) = name
			.strip_prefix(leaf_prefix.as_str())
			.and_then(|rest| rest.strip_suffix(".tif"))
		else {
			continue;
		};
		let stem = stem.strip_suffix("_ir").unwrap_or(stem);
		if !stem.is_empty() {
			stems.insert(stem.to_string());
		}
	}
	Ok(stems)
}
