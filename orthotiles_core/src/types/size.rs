use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// A width/height pair in pixels (tile size) or in tiles (slab size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
	pub width: u32,
	pub height: u32,
}

impl GridSize {
	pub fn new(width: u32, height: u32) -> GridSize {
		GridSize { width, height }
	}

	/// The side length of a square size.
	///
	/// # Errors
	/// Returns an error if width and height differ.
	pub fn square_side(&self) -> Result<u32> {
		ensure!(
			self.width == self.height,
			"size {}x{} is not square",
			self.width,
			self.height
		);
		Ok(self.width)
	}

	pub fn is_square(&self) -> bool {
		self.width == self.height
	}
}
