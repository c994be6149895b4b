/*!
An aggregated graph built from many traversals over a set of vertices.

Each [`PathVertex`] records where traversals visit it, as
[`Occurrence`]s of a traversal at an ordinal. Those occurrences
determine, for each traversal, the sequence of vertices it visits.
[`PathGraph::create_edges`] then joins every pair of consecutive
visits with an edge, creating each edge once and attributing to it
every traversal that uses it.
*/

use std::collections::BTreeMap;

use fnv::FnvHashMap;

use log::{debug, error};

use crate::error::PathGraphError;
use crate::ids::{TraversalId, VertexId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathVertexIx(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathEdgeIx(pub usize);

/// A visit of a traversal at a position of its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Occurrence {
    pub traversal: TraversalId,
    pub ordinal: u64,
}

impl Occurrence {
    #[inline]
    pub fn new<T: Into<TraversalId>>(traversal: T, ordinal: u64) -> Self {
        Self {
            traversal: traversal.into(),
            ordinal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathVertex {
    /// The vertex of the underlying graph this stands for.
    pub vertex_id: VertexId,
    pub segment_id: u64,
    pub marker_count: u64,
    pub occurrences: Vec<Occurrence>,
    /// Layout position, only used when drawing the graph.
    pub position: [f64; 2],
}

impl PathVertex {
    pub fn new(vertex_id: VertexId, segment_id: u64, marker_count: u64) -> Self {
        Self {
            vertex_id,
            segment_id,
            marker_count,
            occurrences: Vec::new(),
            position: [0.0, 0.0],
        }
    }

    /// The number of visits to this vertex.
    #[inline]
    pub fn coverage(&self) -> usize {
        self.occurrences.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEdge {
    pub source: PathVertexIx,
    pub target: PathVertexIx,
    /// For each use of the edge, the traversal and the ordinal of
    /// the visit to `source`.
    pub occurrences: Vec<Occurrence>,
}

impl PathEdge {
    /// The number of traversals using this edge, counted with
    /// multiplicity.
    #[inline]
    pub fn coverage(&self) -> usize {
        self.occurrences.len()
    }
}

/// A directed graph with at most one edge per ordered pair of
/// vertices.
#[derive(Debug, Clone, Default)]
pub struct PathGraph {
    vertices: Vec<PathVertex>,
    edges: Vec<PathEdge>,
    out_edges: Vec<Vec<PathEdgeIx>>,
    in_edges: Vec<Vec<PathEdgeIx>>,
    edge_index: FnvHashMap<(PathVertexIx, PathVertexIx), PathEdgeIx>,
}

impl PathGraph {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_vertex(&mut self, vertex: PathVertex) -> PathVertexIx {
        let ix = PathVertexIx(self.vertices.len());
        self.vertices.push(vertex);
        self.out_edges.push(Vec::new());
        self.in_edges.push(Vec::new());
        ix
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn vertex(&self, ix: PathVertexIx) -> &PathVertex {
        &self.vertices[ix.0]
    }

    #[inline]
    pub fn vertex_mut(&mut self, ix: PathVertexIx) -> &mut PathVertex {
        &mut self.vertices[ix.0]
    }

    #[inline]
    pub fn edge(&self, ix: PathEdgeIx) -> &PathEdge {
        &self.edges[ix.0]
    }

    pub fn vertices(&self) -> impl Iterator<Item = (PathVertexIx, &PathVertex)> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .map(|(ix, vertex)| (PathVertexIx(ix), vertex))
    }

    pub fn edges(&self) -> impl Iterator<Item = (PathEdgeIx, &PathEdge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .map(|(ix, edge)| (PathEdgeIx(ix), edge))
    }

    #[inline]
    pub fn out_edges(&self, vertex: PathVertexIx) -> &[PathEdgeIx] {
        &self.out_edges[vertex.0]
    }

    #[inline]
    pub fn in_edges(&self, vertex: PathVertexIx) -> &[PathEdgeIx] {
        &self.in_edges[vertex.0]
    }

    #[inline]
    pub fn find_edge(
        &self,
        source: PathVertexIx,
        target: PathVertexIx,
    ) -> Option<PathEdgeIx> {
        self.edge_index.get(&(source, target)).copied()
    }

    /// The edge from `source` to `target`, created without
    /// occurrences if it does not exist yet.
    pub fn add_edge_if_absent(
        &mut self,
        source: PathVertexIx,
        target: PathVertexIx,
    ) -> PathEdgeIx {
        assert!(
            source.0 < self.vertices.len() && target.0 < self.vertices.len(),
            "edge {:?} -> {:?} has an endpoint outside the {} vertices",
            source,
            target,
            self.vertices.len()
        );

        let edges = &mut self.edges;
        let out_edges = &mut self.out_edges;
        let in_edges = &mut self.in_edges;
        *self.edge_index.entry((source, target)).or_insert_with(|| {
            let ix = PathEdgeIx(edges.len());
            edges.push(PathEdge {
                source,
                target,
                occurrences: Vec::new(),
            });
            out_edges[source.0].push(ix);
            in_edges[target.0].push(ix);
            ix
        })
    }

    /// The vertices visited by each traversal, in order, as given by
    /// the occurrences stored on the vertices. Every ordinal from 0 to
    /// the largest one seen for a traversal must be visited exactly
    /// once.
    pub fn pseudo_paths(
        &self,
    ) -> Result<BTreeMap<TraversalId, Vec<PathVertexIx>>, PathGraphError> {
        let mut visits: BTreeMap<TraversalId, Vec<(u64, PathVertexIx)>> =
            BTreeMap::new();
        for (ix, vertex) in self.vertices() {
            for occurrence in vertex.occurrences.iter() {
                visits
                    .entry(occurrence.traversal)
                    .or_default()
                    .push((occurrence.ordinal, ix));
            }
        }

        let mut paths = BTreeMap::new();
        for (traversal, mut path) in visits {
            path.sort_by_key(|&(ordinal, _)| ordinal);
            for (expected, &(ordinal, _)) in path.iter().enumerate() {
                let expected = expected as u64;
                if ordinal < expected {
                    return Err(PathGraphError::DuplicateOrdinal { traversal, ordinal });
                }
                if ordinal > expected {
                    return Err(PathGraphError::MissingOrdinal {
                        traversal,
                        ordinal: expected,
                    });
                }
            }
            paths.insert(traversal, path.into_iter().map(|(_, ix)| ix).collect());
        }
        Ok(paths)
    }

    /// Create an edge for each pair of consecutive visits of each
    /// traversal, recording the traversal on the edge. Nothing is
    /// created if any traversal is inconsistent.
    pub fn create_edges(&mut self) -> Result<(), PathGraphError> {
        let paths = self.pseudo_paths().map_err(|err| {
            error!("cannot create path graph edges: {}", err);
            err
        })?;

        for (traversal, path) in paths.iter() {
            for (ordinal, pair) in path.windows(2).enumerate() {
                let edge = self.add_edge_if_absent(pair[0], pair[1]);
                self.edges[edge.0]
                    .occurrences
                    .push(Occurrence::new(*traversal, ordinal as u64));
            }
        }

        debug!(
            "created {} path graph edges from {} traversals",
            self.edge_count(),
            paths.len()
        );
        Ok(())
    }
}
