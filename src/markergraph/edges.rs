use fnv::FnvHashSet;

use log::{debug, info};

use bytemuck::{Pod, Zeroable};

use super::{
    discard, publish_vec, publish_vec_of_vecs, MarkerGraph, EDGES_BY_SOURCE_NAME,
    EDGES_NAME,
};
use crate::{
    config::StorageConfig,
    ids::{CompressedVertexId, EdgeId, VertexId},
    mapped::{temporary_path, MappedVec, MappedVecOfVecs, Result},
};

/// A directed marker graph edge. At most one edge exists for each
/// ordered pair of vertices.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Edge {
    pub source: CompressedVertexId,
    pub target: CompressedVertexId,
}

impl Edge {
    #[inline]
    pub fn new(source: VertexId, target: VertexId) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    #[inline]
    pub fn source(&self) -> VertexId {
        self.source.into()
    }

    #[inline]
    pub fn target(&self) -> VertexId {
        self.target.into()
    }
}

/// Build a new generation of `edges` and `edgesBySource`, under their
/// temporary names, holding `edges` in the given order. On failure,
/// whatever was already created is removed again.
pub(crate) fn build_edges(
    config: &StorageConfig,
    page_size: usize,
    vertex_count: usize,
    edges: &[Edge],
) -> Result<(MappedVec<Edge>, MappedVecOfVecs<EdgeId, CompressedVertexId>)> {
    let temp = |name| config.path(name).map(|path| temporary_path(&path));

    let mut new_edges =
        MappedVec::create_new(temp(EDGES_NAME).as_deref(), page_size)?;
    let filled = new_edges
        .extend_from_slice(edges)
        .and_then(|()| new_edges.flush());
    if let Err(err) = filled {
        discard(new_edges.remove());
        return Err(err);
    }

    let by_source = MappedVecOfVecs::create_new(
        temp(EDGES_BY_SOURCE_NAME).as_deref(),
        page_size,
    );
    let mut by_source = match by_source {
        Ok(by_source) => by_source,
        Err(err) => {
            discard(new_edges.remove());
            return Err(err);
        }
    };
    if let Err(err) = index_by_source(&mut by_source, vertex_count, edges) {
        discard(by_source.remove());
        discard(new_edges.remove());
        return Err(err);
    }

    debug!(
        "built {} edges over {} source vertices",
        new_edges.len(),
        vertex_count
    );

    Ok((new_edges, by_source))
}

fn index_by_source(
    by_source: &mut MappedVecOfVecs<EdgeId, CompressedVertexId>,
    vertex_count: usize,
    edges: &[Edge],
) -> Result<()> {
    by_source.begin_pass1(vertex_count)?;
    for edge in edges.iter() {
        by_source.increment_count(edge.source, 1);
    }
    by_source.begin_pass2()?;
    for (ix, edge) in edges.iter().enumerate() {
        by_source.store(edge.source, EdgeId::from(ix))?;
    }
    by_source.end_pass2()
}

impl MarkerGraph {
    /// Replace all edges with one edge per pair, numbered in the
    /// order given. Both endpoints must be existing vertices and no
    /// ordered pair may appear twice.
    pub fn create_edges(&mut self, pairs: &[(VertexId, VertexId)]) -> Result<()> {
        let vertex_count = self.vertex_count();
        let mut seen: FnvHashSet<(VertexId, VertexId)> = FnvHashSet::default();
        let edges = pairs
            .iter()
            .map(|&(source, target)| {
                assert!(
                    (source.0 as usize) < vertex_count
                        && (target.0 as usize) < vertex_count,
                    "edge {} -> {} has an endpoint outside the {} vertices",
                    source,
                    target,
                    vertex_count
                );
                assert!(
                    seen.insert((source, target)),
                    "duplicate edge {} -> {}",
                    source,
                    target
                );
                Edge::new(source, target)
            })
            .collect::<Vec<_>>();

        self.replace_edges(self.config.page_size, &edges)?;
        info!("created {} marker graph edges", self.edge_count());
        Ok(())
    }

    fn replace_edges(&mut self, page_size: usize, edges: &[Edge]) -> Result<()> {
        let (new_edges, by_source) =
            build_edges(&self.config, page_size, self.vertex_count(), edges)?;
        self.publish_edges(new_edges, by_source)
    }

    /// Rename a generation built by [`build_edges`] over the current
    /// edges.
    pub(crate) fn publish_edges(
        &mut self,
        new_edges: MappedVec<Edge>,
        by_source: MappedVecOfVecs<EdgeId, CompressedVertexId>,
    ) -> Result<()> {
        publish_vec(
            &mut self.edges,
            new_edges,
            self.config.path(EDGES_NAME).as_deref(),
        )?;
        publish_vec_of_vecs(
            &mut self.edges_by_source,
            by_source,
            self.config.path(EDGES_BY_SOURCE_NAME).as_deref(),
        )
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn edge(&self, edge: EdgeId) -> &Edge {
        &self.edges[edge.0 as usize]
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .map(|(ix, edge)| (EdgeId::from(ix), edge))
    }

    /// The IDs of the edges leaving `vertex`, in creation order.
    #[inline]
    pub fn out_edges(&self, vertex: VertexId) -> &[EdgeId] {
        self.edges_by_source.get(self.check_vertex(vertex))
    }

    fn find_edge_ix(&self, source: VertexId, target: VertexId) -> Option<EdgeId> {
        let target = CompressedVertexId::from(target);
        self.out_edges(source)
            .iter()
            .copied()
            .find(|&edge| self.edges[edge.0 as usize].target == target)
    }

    /// The edge from `source` to `target`, if there is one.
    pub fn find_edge(&self, source: VertexId, target: VertexId) -> Option<&Edge> {
        self.find_edge_ix(source, target).map(|edge| self.edge(edge))
    }

    /// The ID of the edge from `source` to `target`, which must exist.
    pub fn find_edge_id(&self, source: VertexId, target: VertexId) -> EdgeId {
        match self.find_edge_ix(source, target) {
            Some(edge) => edge,
            None => panic!(
                "the marker graph has no edge from vertex {} to vertex {}",
                source, target
            ),
        }
    }
}
