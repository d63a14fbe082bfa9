//! Bijection between OPI names and 24-bit identity colors.
//!
//! The rasterized graph encodes "which OPI owns this pixel" as an RGB value,
//! so every OPI gets a unique triplet. `[0, 0, 0]` is reserved as the
//! "no OPI" background and is never assigned.
//!
//! The relation is persisted twice: the nested color-to-name mapping goes to
//! `cache_mtd.json`, the per-name color lives in `list_OPI` inside the
//! overviews descriptor. Both views are rebuilt together by the planner.

use anyhow::{Result, ensure};
use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Identity color of one OPI.
pub type OpiColor = [u8; 3];

type ColorTree = BTreeMap<u8, BTreeMap<u8, BTreeMap<u8, String>>>;

/// The color/name registry. Serializes as the three-level `R -> G -> B ->
/// name` mapping with decimal string keys, the on-disk shape of
/// `cache_mtd.json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorRegistry {
	by_color: ColorTree,
	by_name: BTreeMap<String, OpiColor>,
}

impl ColorRegistry {
	pub fn new() -> ColorRegistry {
		ColorRegistry::default()
	}

	pub fn is_empty(&self) -> bool {
		self.by_name.is_empty()
	}

	pub fn len(&self) -> usize {
		self.by_name.len()
	}

	pub fn contains_color(&self, color: OpiColor) -> bool {
		self.lookup_by_color(color).is_some()
	}

	pub fn lookup_by_color(&self, color: OpiColor) -> Option<&str> {
		self
			.by_color
			.get(&color[0])
			.and_then(|greens| greens.get(&color[1]))
			.and_then(|blues| blues.get(&color[2]))
			.map(String::as_str)
	}

	pub fn lookup_by_name(&self, name: &str) -> Option<OpiColor> {
		self.by_name.get(name).copied()
	}

	/// Color for `name`, assigning a fresh one on first registration.
	///
	/// Fresh colors are drawn uniformly from `[0, 254]^3` and re-drawn while
	/// the triplet is taken or all-zero.
	pub fn assign_color(&mut self, name: &str, rng: &mut impl Rng) -> OpiColor {
		if let Some(color) = self.lookup_by_name(name) {
			return color;
		}
		let mut color: OpiColor = [0, 0, 0];
		while color == [0, 0, 0] || self.contains_color(color) {
			color = [
				rng.random_range(0..=254),
				rng.random_range(0..=254),
				rng.random_range(0..=254),
			];
		}
		self.insert(name, color).unwrap();
		color
	}

	/// Insert a known pair, as when rebuilding the registry from `list_OPI`.
	///
	/// # Errors
	/// Returns an error if the color is already bound to another name.
	pub fn insert(&mut self, name: &str, color: OpiColor) -> Result<()> {
		if let Some(owner) = self.lookup_by_color(color) {
			ensure!(
				owner == name,
				"color {color:?} is already assigned to '{owner}', cannot reassign to '{name}'"
			);
			return Ok(());
		}
		self
			.by_color
			.entry(color[0])
			.or_default()
			.entry(color[1])
			.or_default()
			.insert(color[2], name.to_string());
		self.by_name.insert(name.to_string(), color);
		Ok(())
	}
}

impl Serialize for ColorRegistry {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.by_color.serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for ColorRegistry {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let by_color = ColorTree::deserialize(deserializer)?;
		let mut by_name = BTreeMap::new();
		for (r, greens) in &by_color {
			for (g, blues) in greens {
				for (b, name) in blues {
					by_name.insert(name.clone(), [*r, *g, *b]);
				}
			}
		}
		Ok(ColorRegistry { by_color, by_name })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::{SeedableRng, rngs::StdRng};
	use std::collections::HashSet;

	#[test]
	fn assign_is_stable_per_name() {
		let mut rng = StdRng::seed_from_u64(7);
		let mut registry = ColorRegistry::new();
		let color = registry.assign_color("opi_A", &mut rng);
		assert_eq!(registry.assign_color("opi_A", &mut rng), color);
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn round_trips_name_and_color() {
		let mut rng = StdRng::seed_from_u64(7);
		let mut registry = ColorRegistry::new();
		let color = registry.assign_color("opi_A", &mut rng);
		assert_eq!(registry.lookup_by_name("opi_A"), Some(color));
		assert_eq!(registry.lookup_by_color(color), Some("opi_A"));
	}

	#[test]
	fn never_assigns_the_background_color() {
		let mut rng = StdRng::seed_from_u64(0);
		let mut registry = ColorRegistry::new();
		for i in 0..2000 {
			let color = registry.assign_color(&format!("opi_{i}"), &mut rng);
			assert_ne!(color, [0, 0, 0]);
		}
	}

	#[test]
	fn colors_stay_unique_under_stress() {
		let mut rng = StdRng::seed_from_u64(42);
		let mut registry = ColorRegistry::new();
		let mut seen = HashSet::new();
		for i in 0..10_000 {
			let name = format!("opi_{i}");
			let color = registry.assign_color(&name, &mut rng);
			assert!(seen.insert(color), "color {color:?} assigned twice");
			assert_eq!(registry.lookup_by_color(color), Some(name.as_str()));
		}
		assert_eq!(registry.len(), 10_000);
	}

	#[test]
	fn insert_rejects_color_clashes() {
		let mut registry = ColorRegistry::new();
		registry.insert("opi_A", [1, 2, 3]).unwrap();
		registry.insert("opi_A", [1, 2, 3]).unwrap();
		assert!(registry.insert("opi_B", [1, 2, 3]).is_err());
	}

	#[test]
	fn serializes_as_nested_decimal_keys() {
		let mut registry = ColorRegistry::new();
		registry.insert("opi_A", [12, 0, 254]).unwrap();
		let json = serde_json::to_string(&registry).unwrap();
		assert_eq!(json, r#"{"12":{"0":{"254":"opi_A"}}}"#);

		let back: ColorRegistry = serde_json::from_str(&json).unwrap();
		assert_eq!(back.lookup_by_name("opi_A"), Some([12, 0, 254]));
		assert_eq!(back, registry);
	}
}
