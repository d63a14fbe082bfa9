use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in world coordinates (CRS units).
///
/// `x` grows eastward, `y` grows northward. Pixel space is the other way
/// around: row 0 of a raster is the *northern* edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRect {
	pub xmin: f64,
	pub ymin: f64,
	pub xmax: f64,
	pub ymax: f64,
}

impl GeoRect {
	pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> GeoRect {
		GeoRect { xmin, ymin, xmax, ymax }
	}

	/// Footprint of a georeferenced image, derived from its affine transform
	/// and pixel dimensions. The transform is the usual GDAL sextet
	/// `(origin_x, pixel_w, 0, origin_y, 0, -pixel_h)`.
	pub fn from_geo_transform(transform: &[f64; 6], raster_width: usize, raster_height: usize) -> GeoRect {
		let ul_x = transform[0];
		let ul_y = transform[3];
		let lr_x = ul_x + raster_width as f64 * transform[1];
		let lr_y = ul_y + raster_height as f64 * transform[5];
		GeoRect {
			xmin: ul_x.min(lr_x),
			ymin: ul_y.min(lr_y),
			xmax: ul_x.max(lr_x),
			ymax: ul_y.max(lr_y),
		}
	}

	pub fn width(&self) -> f64 {
		self.xmax - self.xmin
	}

	pub fn height(&self) -> f64 {
		self.ymax - self.ymin
	}

	pub fn intersects(&self, other: &GeoRect) -> bool {
		self.xmin < other.xmax && other.xmin < self.xmax && self.ymin < other.ymax && other.ymin < self.ymax
	}
}

/// The same rectangle in the `LowerCorner`/`UpperCorner` shape used by the
/// overviews descriptor for `dataSet.boundingBox`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerRect {
	#[serde(rename = "LowerCorner")]
	pub lower_corner: [f64; 2],
	#[serde(rename = "UpperCorner")]
	pub upper_corner: [f64; 2],
}

impl From<GeoRect> for CornerRect {
	fn from(rect: GeoRect) -> CornerRect {
		CornerRect {
			lower_corner: [rect.xmin, rect.ymin],
			upper_corner: [rect.xmax, rect.ymax],
		}
	}
}

impl From<CornerRect> for GeoRect {
	fn from(rect: CornerRect) -> GeoRect {
		GeoRect {
			xmin: rect.lower_corner[0],
			ymin: rect.lower_corner[1],
			xmax: rect.upper_corner[0],
			ymax: rect.upper_corner[1],
		}
	}
}
