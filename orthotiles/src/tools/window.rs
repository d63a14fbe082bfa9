use anyhow::{Result, ensure};
use orthotiles_core::{PyramidDescriptor, SlabWindow};

/// The `-i/--input` quintet shared by all worker subcommands.
#[derive(clap::Args, Debug)]
pub struct WindowArg {
	/// slab window (level, slabXMin, slabYMin, slabXMax, slabYMax)
	#[arg(
		short = 'i',
		long = "input",
		required = true,
		num_args = 5,
		value_names = ["LEVEL", "XMIN", "YMIN", "XMAX", "YMAX"]
	)]
	pub input: Vec<u32>,
}

impl WindowArg {
	/// Split into level and window, checking the level is slab-aligned in
	/// this pyramid.
	pub fn resolve(&self, pyramid: &PyramidDescriptor) -> Result<(u32, SlabWindow)> {
		ensure!(self.input.len() == 5, "input needs 5 values");
		let (level, x_min, y_min, x_max, y_max) =
			(self.input[0], self.input[1], self.input[2], self.input[3], self.input[4]);
		ensure!(x_min <= x_max && y_min <= y_max, "slab window is inverted");
		ensure!(
			pyramid.is_slab_aligned(level),
			"level {level} is not aligned on slab boundaries"
		);
		Ok((
			level,
			SlabWindow {
				x_min,
				y_min,
				x_max,
				y_max,
			},
		))
	}
}
