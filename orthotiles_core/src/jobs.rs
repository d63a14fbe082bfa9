//! The job DAG handed to the external orchestrator.
//!
//! On disk the schema is `{projects: [{name, jobs: [{name, command}],
//! deps?: [{id}]}]}` where `command` is a flat command line. In memory the
//! command stays a structured program/argv pair; the flat string is only a
//! presentation of it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// A program plus its argument vector.
///
/// Serializes as a single space-joined string, the shape the orchestrator's
/// `command` field expects. Arguments containing whitespace do not survive
/// that flat representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
	pub program: String,
	pub args: Vec<String>,
}

impl CommandLine {
	pub fn new(program: impl Into<String>) -> CommandLine {
		CommandLine {
			program: program.into(),
			args: Vec::new(),
		}
	}

	pub fn arg(mut self, arg: impl Into<String>) -> CommandLine {
		self.args.push(arg.into());
		self
	}

	pub fn args<I: IntoIterator<Item = S>, S: Into<String>>(mut self, args: I) -> CommandLine {
		for arg in args {
			self = self.arg(arg);
		}
		self
	}
}

impl Serialize for CommandLine {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut line = self.program.clone();
		for arg in &self.args {
			line.push(' ');
			line.push_str(arg);
		}
		serializer.serialize_str(&line)
	}
}

impl<'de> Deserialize<'de> for CommandLine {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let line = String::deserialize(deserializer)?;
		let mut parts = line.split_whitespace().map(str::to_string);
		let program = parts
			.next()
			.ok_or_else(|| serde::de::Error::custom("empty command line"))?;
		Ok(CommandLine {
			program,
			args: parts.collect(),
		})
	}
}

/// One unit of work for the orchestrator: a display name and the command to
/// run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
	pub name: String,
	pub command: CommandLine,
}

/// Dependency on another project of the same DAG, by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dep {
	pub id: usize,
}

/// A named group of jobs; all jobs of a project may run in any order once
/// the project's dependencies completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
	pub name: String,
	pub jobs: Vec<Job>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub deps: Option<Vec<Dep>>,
}

/// The full DAG: an ordered list of projects with happens-before edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDag {
	pub projects: Vec<Project>,
}

impl JobDag {
	pub fn new() -> JobDag {
		JobDag::default()
	}

	/// Append a project depending on the listed earlier projects; returns its
	/// index for later `deps` references.
	pub fn push_project(&mut self, name: impl Into<String>, jobs: Vec<Job>, deps: &[usize]) -> usize {
		self.projects.push(Project {
			name: name.into(),
			jobs,
			deps: if deps.is_empty() {
				None
			} else {
				Some(deps.iter().map(|id| Dep { id: *id }).collect())
			},
		});
		self.projects.len() - 1
	}

	pub fn save(&self, path: &Path) -> Result<()> {
		fs::write(path, serde_json::to_string(self)?).with_context(|| format!("writing job file '{}'", path.display()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn job(name: &str) -> Job {
		Job {
			name: name.to_string(),
			command: CommandLine::new("orthotiles").args(["rasterize-graph", "-c", "cache"]),
		}
	}

	#[test]
	fn command_serializes_as_flat_string() {
		let json = serde_json::to_string(&job("21_0_0")).unwrap();
		assert_eq!(
			json,
			r#"{"name":"21_0_0","command":"orthotiles rasterize-graph -c cache"}"#
		);
	}

	#[test]
	fn command_round_trips() {
		let original = job("21_0_0");
		let back: Job = serde_json::from_str(&serde_json::to_string(&original).unwrap()).unwrap();
		assert_eq!(back, original);
	}

	#[test]
	fn dag_schema_matches_orchestrator() {
		let mut dag = JobDag::new();
		let cut = dag.push_project("cut_opi", vec![job("opi_A_21_0_0")], &[]);
		let graph = dag.push_project("rasterize_graph", vec![job("21_0_0")], &[cut]);
		dag.push_project("assemble_ortho", vec![job("21_0_0")], &[graph]);

		let json = serde_json::to_value(&dag).unwrap();
		assert!(json["projects"][0].get("deps").is_none());
		assert_eq!(json["projects"][1]["deps"], serde_json::json!([{ "id": 0 }]));
		assert_eq!(json["projects"][2]["deps"], serde_json::json!([{ "id": 1 }]));
	}

	#[test]
	fn save_writes_json() {
		let temp = assert_fs::TempDir::new().unwrap();
		let path = temp.path().join("create.json");
		let mut dag = JobDag::new();
		dag.push_project("cut_opi", vec![job("a")], &[]);
		dag.save(&path).unwrap();
		let text = std::fs::read_to_string(&path).unwrap();
		assert!(text.starts_with(r#"{"projects":"#));
	}
}
