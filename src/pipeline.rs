//! The order in which the parts of a segment are read.
//!
//! A segment is just all the bands one after the other, so the bands can only be read in exactly the
//! order they were written in. Reading a band needs its length, and some bands hold references into
//! other ones. These dependencies form a graph, and the order of the [`STEPS`] must be a topological
//! order of it.

use std::fmt::{Display, Formatter};
use anyhow::{bail, Result};
use indexmap::IndexMap;
use log::debug;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

/// One group of bands that is read as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DecodeStep {
	/// The segment header with all counts, and the band headers.
	Header,
	ConstantPool,
	AttributeDefinitions,
	InnerClasses,
	/// The classes with their super classes, interfaces and the number of fields and methods.
	Classes,
	/// The field descriptors and the field attribute bands.
	FieldAttributes,
	/// The method descriptors and the method attribute bands.
	MethodAttributes,
	ClassAttributes,
	/// The code headers, the exception handlers and the code attribute bands.
	CodeHeaders,
	/// The opcodes and all operand bands.
	Bytecodes,
	Files,
}

/// All steps, in the order they must be read in.
pub const STEPS: [DecodeStep; 11] = [
	DecodeStep::Header,
	DecodeStep::ConstantPool,
	DecodeStep::AttributeDefinitions,
	DecodeStep::InnerClasses,
	DecodeStep::Classes,
	DecodeStep::FieldAttributes,
	DecodeStep::MethodAttributes,
	DecodeStep::ClassAttributes,
	DecodeStep::CodeHeaders,
	DecodeStep::Bytecodes,
	DecodeStep::Files,
];

impl DecodeStep {
	/// The steps that give lengths for, or are referenced from, the bands of this step.
	pub fn dependencies(self) -> &'static [DecodeStep] {
		use DecodeStep::*;
		match self {
			Header => &[],
			ConstantPool => &[Header],
			AttributeDefinitions => &[Header, ConstantPool],
			InnerClasses => &[Header, ConstantPool],
			Classes => &[Header, ConstantPool],
			FieldAttributes => &[Classes, ConstantPool, AttributeDefinitions],
			MethodAttributes => &[Classes, ConstantPool, AttributeDefinitions],
			ClassAttributes => &[Classes, ConstantPool, AttributeDefinitions, InnerClasses],
			CodeHeaders => &[MethodAttributes, AttributeDefinitions],
			Bytecodes => &[Classes, ConstantPool, FieldAttributes, MethodAttributes, CodeHeaders],
			Files => &[Header, ConstantPool, Classes],
		}
	}
}

impl Display for DecodeStep {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{self:?}")
	}
}

/// The graph of the dependencies between the steps, with edges from each dependency to its dependent.
pub struct DependencyGraph {
	graph: DiGraph<DecodeStep, ()>,
	nodes: IndexMap<DecodeStep, NodeIndex>,
}

impl DependencyGraph {
	pub fn new() -> DependencyGraph {
		let mut graph = DiGraph::new();
		let nodes: IndexMap<_, _> = STEPS.iter()
			.map(|&step| (step, graph.add_node(step)))
			.collect();
		for (&step, &node) in &nodes {
			for dependency in step.dependencies() {
				graph.add_edge(nodes[dependency], node, ());
			}
		}
		DependencyGraph { graph, nodes }
	}

	/// Checks that the graph has no cycles, and that [`STEPS`] lists every step after all its dependencies.
	pub fn check_order(&self) -> Result<()> {
		if let Err(cycle) = toposort(&self.graph, None) {
			bail!("the dependencies of the decode steps contain a cycle, including {}", self.graph[cycle.node_id()]);
		}
		for (position, step) in STEPS.iter().enumerate() {
			for dependency in self.dependencies_of(*step) {
				if !STEPS[..position].contains(&dependency) {
					bail!("decode step {step} comes before its dependency {dependency}");
				}
			}
		}
		Ok(())
	}

	pub fn dependencies_of(&self, step: DecodeStep) -> impl Iterator<Item=DecodeStep> + '_ {
		self.graph.neighbors_directed(self.nodes[&step], Direction::Incoming)
			.map(|node| self.graph[node])
	}
}

impl Default for DependencyGraph {
	fn default() -> Self {
		DependencyGraph::new()
	}
}

/// Keeps track of the steps read so far, making sure they are read in order.
pub(crate) struct Pipeline {
	graph: DependencyGraph,
	next: usize,
	last_position: usize,
}

impl Pipeline {
	pub(crate) fn new() -> Pipeline {
		Pipeline { graph: DependencyGraph::new(), next: 0, last_position: 0 }
	}

	/// Starts reading the bands of a step, at the given input position.
	pub(crate) fn begin(&mut self, step: DecodeStep, position: usize) -> Result<()> {
		let Some(&expected) = STEPS.get(self.next) else {
			bail!("decode step {step} after all steps were done");
		};
		if step != expected {
			bail!("decode step {step} out of order, expected {expected}");
		}
		if let Some(missing) = self.graph.dependencies_of(step).find(|dependency| !STEPS[..self.next].contains(dependency)) {
			bail!("decode step {step} needs {missing} first");
		}
		if self.next > 0 {
			debug!("{} took {} bytes", STEPS[self.next - 1], position - self.last_position);
		}
		self.next += 1;
		self.last_position = position;
		Ok(())
	}

	/// Ends the last step, checking that all steps were read.
	pub(crate) fn finish(&mut self, position: usize) -> Result<()> {
		if self.next != STEPS.len() {
			bail!("only read {} of the {} decode steps", self.next, STEPS.len());
		}
		debug!("{} took {} bytes", STEPS[self.next - 1], position - self.last_position);
		Ok(())
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::pipeline::{DecodeStep, DependencyGraph, Pipeline, STEPS};

	#[test]
	fn steps_are_a_topological_order() -> Result<()> {
		DependencyGraph::new().check_order()
	}

	#[test]
	fn graph_has_all_dependencies() {
		let graph = DependencyGraph::new();
		let mut dependencies: Vec<_> = graph.dependencies_of(DecodeStep::Bytecodes).collect();
		dependencies.sort();
		assert_eq!(dependencies, vec![
			DecodeStep::ConstantPool,
			DecodeStep::Classes,
			DecodeStep::FieldAttributes,
			DecodeStep::MethodAttributes,
			DecodeStep::CodeHeaders,
		]);
		assert_eq!(graph.dependencies_of(DecodeStep::Header).count(), 0);
	}

	#[test]
	fn pipeline_rejects_skipped_steps() -> Result<()> {
		let mut pipeline = Pipeline::new();
		pipeline.begin(DecodeStep::Header, 0)?;
		assert!(pipeline.begin(DecodeStep::Classes, 10).is_err());
		pipeline.begin(DecodeStep::ConstantPool, 10)?;
		assert!(pipeline.finish(20).is_err());
		Ok(())
	}

	#[test]
	fn pipeline_runs_all_steps() -> Result<()> {
		let mut pipeline = Pipeline::new();
		for (i, step) in STEPS.into_iter().enumerate() {
			pipeline.begin(step, i)?;
		}
		pipeline.finish(STEPS.len())
	}
}
