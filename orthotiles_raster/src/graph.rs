//! Access to the vector seam graph: a polygon layer where each feature
//! carries the `cliche` attribute naming the OPI that fills its area.
//!
//! The source is either a vector file (GeoPackage, Shapefile, ...) or a
//! database connection string with a driver prefix such as
//! `PG:host=localhost dbname=demo`.

use anyhow::{Context, Result, anyhow, bail, ensure};
use gdal::vector::{Geometry, LayerAccess};
use gdal::{Dataset, DatasetOptions, GdalOpenFlags};
use orthotiles_core::GeoRect;
use regex::Regex;
use std::sync::LazyLock;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}[/-]\d{2}[/-]\d{2}").unwrap());
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}[h:][0-5]\d").unwrap());

/// One polygon of the graph, reduced to the attributes the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphFeature {
	pub cliche: String,
	pub date: Option<String>,
	pub time_ut: Option<String>,
}

/// An opened graph source bound to one layer.
pub struct GraphSource {
	dataset: Dataset,
	table: String,
}

impl GraphSource {
	/// Open `source` and check that the layer `table` exists.
	pub fn open(source: &str, table: &str) -> Result<GraphSource> {
		let table = checked_table_name(table)?;
		let options = DatasetOptions {
			open_flags: GdalOpenFlags::GDAL_OF_VECTOR,
			..DatasetOptions::default()
		};
		let dataset = Dataset::open_ex(source, options)
			.with_context(|| format!("connection to graph source '{source}' failed"))?;
		dataset
			.layer_by_name(&table)
			.map_err(|_| anyhow!("table '{table}' doesn't exist"))?;
		Ok(GraphSource { dataset, table })
	}

	/// Check that the layer carries the `DATE` and `HEURE_TU` columns.
	pub fn require_metadata(&self) -> Result<()> {
		let layer = self.dataset.layer_by_name(&self.table)?;
		let mut has_date = false;
		let mut has_time = false;
		for field in layer.defn().fields() {
			match field.name().as_str() {
				"DATE" => has_date = true,
				"HEURE_TU" => has_time = true,
				_ => {}
			}
		}
		ensure!(
			has_date && has_time,
			"input graph without metadata (DATE and HEURE_TU columns required)"
		);
		Ok(())
	}

	/// Axis-aligned bounding box of the whole layer, in world coordinates.
	pub fn extent(&self) -> Result<GeoRect> {
		let layer = self.dataset.layer_by_name(&self.table)?;
		let envelope = layer.get_extent().context("graph layer has no extent")?;
		Ok(GeoRect::new(envelope.MinX, envelope.MinY, envelope.MaxX, envelope.MaxY))
	}

	/// The features intersecting `rect` (or all features), with date/time
	/// attributes when `with_metadata` is set.
	pub fn features_in(&self, rect: Option<&GeoRect>, with_metadata: bool) -> Result<Vec<GraphFeature>> {
		let mut layer = self.dataset.layer_by_name(&self.table)?;
		if let Some(rect) = rect {
			layer.set_spatial_filter_rect(rect.xmin, rect.ymin, rect.xmax, rect.ymax);
		}
		let mut features = Vec::new();
		for feature in layer.features() {
			let Some(cliche) = feature.field_as_string_by_name("cliche")? else {
				log::warn!("graph feature without 'cliche' attribute, skipping");
				continue;
			};
			let (date, time_ut) = if with_metadata {
				(
					feature.field_as_string_by_name("DATE")?,
					feature.field_as_string_by_name("HEURE_TU")?,
				)
			} else {
				(None, None)
			};
			features.push(GraphFeature { cliche, date, time_ut });
		}
		Ok(features)
	}

	/// Geometries of the features of one `cliche` intersecting `rect`,
	/// selected by exact attribute equality.
	pub fn cliche_geometries(&self, cliche: &str, rect: &GeoRect) -> Result<Vec<Geometry>> {
		let mut layer = self.dataset.layer_by_name(&self.table)?;
		layer.set_spatial_filter_rect(rect.xmin, rect.ymin, rect.xmax, rect.ymax);
		layer.set_attribute_filter(&format!("cliche = '{}'", cliche.replace('\'', "''")))?;
		let mut geometries = Vec::new();
		for feature in layer.features() {
			if let Some(geometry) = feature.geometry() {
				geometries.push(geometry.clone());
			}
		}
		Ok(geometries)
	}
}

/// Strip quoting and reject table names starting with a digit, which would
/// need quoting in every SQL fragment the workers emit.
pub fn checked_table_name(table: &str) -> Result<String> {
	let table = table.trim_matches(['\'', '"']).to_string();
	ensure!(!table.is_empty(), "empty table name");
	if table.chars().next().unwrap().is_ascii_digit() {
		bail!("first char of table '{table}' is a digit, rename the table or quote it");
	}
	Ok(table)
}

/// Validate and normalize an acquisition date: `yyyy-mm-dd` or `yyyy/mm/dd`,
/// stored with dashes.
pub fn checked_date(raw: Option<&str>) -> Result<String> {
	match raw {
		Some(date) if DATE_RE.is_match(date) => Ok(date.replace('/', "-")),
		other => bail!(
			"date {other:?} not in the correct format (expected: yyyy-mm-dd or yyyy/mm/dd)"
		),
	}
}

/// Validate and normalize an acquisition time: `HHhmm` or `HH:mm`, stored
/// with a colon.
pub fn checked_time_ut(raw: Option<&str>) -> Result<String> {
	match raw {
		Some(time) if TIME_RE.is_match(time) => Ok(time.replace('h', ":")),
		other => bail!("time {other:?} not in the correct format (expected: HHhmm or HH:mm)"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("graphe_zone_test", "graphe_zone_test")]
	#[case("'graphe_zone_test'", "graphe_zone_test")]
	#[case("\"graphe\"", "graphe")]
	fn table_names_are_unquoted(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(checked_table_name(input).unwrap(), expected);
	}

	#[test]
	fn leading_digit_table_is_rejected() {
		assert!(checked_table_name("2024_graphe").is_err());
		assert!(checked_table_name("'2024_graphe'").is_err());
		assert!(checked_table_name("").is_err());
	}

	#[rstest]
	#[case("2024-05-01", "2024-05-01")]
	#[case("2024/05/01", "2024-05-01")]
	fn dates_are_normalized(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(checked_date(Some(input)).unwrap(), expected);
	}

	#[rstest]
	#[case(None)]
	#[case(Some("01-05-2024"))]
	#[case(Some("2024.05.01"))]
	fn bad_dates_are_rejected(#[case] input: Option<&str>) {
		assert!(checked_date(input).is_err());
	}

	#[rstest]
	#[case("10h30", "10:30")]
	#[case("10:30", "10:30")]
	fn times_are_normalized(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(checked_time_ut(Some(input)).unwrap(), expected);
	}

	#[rstest]
	#[case(None)]
	#[case(Some("10h70"))]
	#[case(Some("9:30"))]
	fn bad_times_are_rejected(#[case] input: Option<&str>) {
		assert!(checked_time_ut(input).is_err());
	}
}
