use serde::{Deserialize, Serialize};

/// Inclusive tile index range of a level, as stored in `dataSet.limits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileLimits {
	#[serde(rename = "MinTileCol")]
	pub col_min: u32,
	#[serde(rename = "MinTileRow")]
	pub row_min: u32,
	#[serde(rename = "MaxTileCol")]
	pub col_max: u32,
	#[serde(rename = "MaxTileRow")]
	pub row_max: u32,
}

impl TileLimits {
	/// Widen this range so it also covers `other`.
	pub fn merge(&mut self, other: &TileLimits) {
		self.col_min = self.col_min.min(other.col_min);
		self.row_min = self.row_min.min(other.row_min);
		self.col_max = self.col_max.max(other.col_max);
		self.row_max = self.row_max.max(other.row_max);
	}
}

/// Inclusive slab index range of a slab-aligned level, as stored in
/// `dataSet.slabLimits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlabLimits {
	#[serde(rename = "MinSlabCol")]
	pub col_min: u32,
	#[serde(rename = "MinSlabRow")]
	pub row_min: u32,
	#[serde(rename = "MaxSlabCol")]
	pub col_max: u32,
	#[serde(rename = "MaxSlabRow")]
	pub row_max: u32,
}

impl SlabLimits {
	pub fn merge(&mut self, other: &SlabLimits) {
		self.col_min = self.col_min.min(other.col_min);
		self.row_min = self.row_min.min(other.row_min);
		self.col_max = self.col_max.max(other.col_max);
		self.row_max = self.row_max.max(other.row_max);
	}

	/// Split this range into windows of at most `subsize` x `subsize` slabs,
	/// column-major, clamped to the range bounds.
	pub fn chunks(&self, subsize: u32) -> Vec<SlabWindow> {
		let subsize = subsize.max(1);
		let mut windows = Vec::new();
		let mut x = self.col_min;
		while x <= self.col_max {
			let mut y = self.row_min;
			while y <= self.row_max {
				windows.push(SlabWindow {
					x_min: x,
					y_min: y,
					x_max: (x + subsize - 1).min(self.col_max),
					y_max: (y + subsize - 1).min(self.row_max),
				});
				y += subsize;
			}
			x += subsize;
		}
		windows
	}
}

/// A rectangular group of slabs, the work unit of one emitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabWindow {
	pub x_min: u32,
	pub y_min: u32,
	pub x_max: u32,
	pub y_max: u32,
}

impl SlabWindow {
	/// Iterate all slab positions of the window, column-major.
	pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + use<> {
		let (x_min, y_min, x_max, y_max) = (self.x_min, self.y_min, self.x_max, self.y_max);
		(x_min..=x_max).flat_map(move |x| (y_min..=y_max).map(move |y| (x, y)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn merge_tile_limits() {
		let mut a = TileLimits {
			col_min: 4,
			row_min: 2,
			col_max: 9,
			row_max: 7,
		};
		a.merge(&TileLimits {
			col_min: 1,
			row_min: 5,
			col_max: 6,
			row_max: 11,
		});
		assert_eq!(
			a,
			TileLimits {
				col_min: 1,
				row_min: 2,
				col_max: 9,
				row_max: 11,
			}
		);
	}

	#[test]
	fn chunks_of_two() {
		// 4x4 slab range, subsize 2: exactly four 2x2 windows
		let limits = SlabLimits {
			col_min: 0,
			row_min: 0,
			col_max: 3,
			row_max: 3,
		};
		assert_eq!(
			limits.chunks(2),
			vec![
				SlabWindow { x_min: 0, y_min: 0, x_max: 1, y_max: 1 },
				SlabWindow { x_min: 0, y_min: 2, x_max: 1, y_max: 3 },
				SlabWindow { x_min: 2, y_min: 0, x_max: 3, y_max: 1 },
				SlabWindow { x_min: 2, y_min: 2, x_max: 3, y_max: 3 },
			]
		);
	}

	#[test]
	fn chunks_clamp_at_bounds() {
		let limits = SlabLimits {
			col_min: 0,
			row_min: 0,
			col_max: 4,
			row_max: 1,
		};
		let windows = limits.chunks(2);
		assert_eq!(windows.len(), 3);
		assert_eq!(windows[2], SlabWindow { x_min: 4, y_min: 0, x_max: 4, y_max: 1 });
	}

	#[test]
	fn window_iteration() {
		let window = SlabWindow {
			x_min: 1,
			y_min: 2,
			x_max: 2,
			y_max: 3,
		};
		assert_eq!(window.iter().collect::<Vec<_>>(), vec![(1, 2), (1, 3), (2, 2), (2, 3)]);
	}

	#[test]
	fn serde_field_names() {
		let json = serde_json::to_string(&TileLimits {
			col_min: 1,
			row_min: 2,
			col_max: 3,
			row_max: 4,
		})
		.unwrap();
		assert_eq!(json, r#"{"MinTileCol":1,"MinTileRow":2,"MaxTileCol":3,"MaxTileRow":4}"#);
	}
}
