/*!
An out-of-core marker graph, and the aggregated path graph built from
traversals over it.

# Overview

A marker graph groups markers, the atomic units of the input
traversals, into vertices, and joins vertices with directed edges.
All of its structures live in memory mappings, backed by files in a
directory or by anonymous memory, so that the graph can be larger than
the available memory.

* [`MarkerGraph`](markergraph::MarkerGraph) holds the vertices, the
  reverse index from markers to vertices, and the edges. Its
  structures are built in bulk and only ever replaced wholesale, most
  importantly by
  [`remove_vertices`](markergraph::MarkerGraph::remove_vertices),
  which rebuilds the graph from a list of surviving vertices using a
  pool of worker threads.
* [`PathGraph`](pathgraph::PathGraph) is a small in-memory graph
  whose edges are derived from the order in which traversals visit its
  vertices, each edge remembering the traversals that use it.

# Storage

* [`mapped`] has the memory-mapped collections:
  [`MappedVec`](mapped::MappedVec) and the two-pass
  [`MappedVecOfVecs`](mapped::MappedVecOfVecs).
* [`config`] describes where structures are stored and how
  compaction is run.
* [`parallel`] has the worker pool and the batch cursor used by the
  parallel passes.

# Misc.

* [`export`] writes a path graph as GFA, CSV, Graphviz, or SVG.
* [`util::validate`] checks the consistency of a marker graph.

*/

pub mod ids;

pub mod config;
pub mod error;

pub mod mapped;
pub mod parallel;

pub mod markergraph;
pub mod pathgraph;

pub mod export;
pub mod util;

pub use self::{
    config::{CompactionOptions, StorageConfig},
    error::{PathGraphError, StorageError},
    ids::{CompressedVertexId, EdgeId, MarkerId, TraversalId, VertexId},
    markergraph::MarkerGraph,
    pathgraph::PathGraph,
};
