/*!
The marker graph: vertices are groups of markers, stored out of core.

A [`MarkerGraph`] is made of four memory-mapped structures:

* `vertices`, the markers of each vertex, as a
  [`MappedVecOfVecs`] keyed by vertex;
* `vertexTable`, the reverse index giving the vertex of each marker,
  or [`CompressedVertexId::INVALID`] for markers that belong to no
  vertex;
* `edges`, the flat array of [`Edge`] records;
* `edgesBySource`, the IDs of the edges leaving each vertex.

The structures are never edited record by record. They are built in
bulk, and replaced wholesale by
[`remove_vertices`](MarkerGraph::remove_vertices), which builds the
new generation under a temporary name and then renames it over the
old one.
*/

pub mod compaction;
pub mod edges;

pub use self::edges::Edge;

use std::path::Path;

use bytemuck::Pod;

use log::{info, warn};

use crate::{
    config::StorageConfig,
    ids::{CompressedVertexId, EdgeId, MarkerId, RecordKey, VertexId},
    mapped::{MappedVec, MappedVecOfVecs, Result},
};

pub const VERTICES_NAME: &str = "vertices";
pub const VERTEX_TABLE_NAME: &str = "vertexTable";
pub const EDGES_NAME: &str = "edges";
pub const EDGES_BY_SOURCE_NAME: &str = "edgesBySource";

pub struct MarkerGraph {
    config: StorageConfig,
    vertices: MappedVecOfVecs<MarkerId, CompressedVertexId>,
    vertex_table: MappedVec<CompressedVertexId>,
    edges: MappedVec<Edge>,
    edges_by_source: MappedVecOfVecs<EdgeId, CompressedVertexId>,
}

impl MarkerGraph {
    /// Create an empty marker graph, with no vertices, markers, or
    /// edges.
    pub fn create_new(config: &StorageConfig) -> Result<Self> {
        let page_size = config.page_size;
        let path = |name| config.path(name);
        Ok(Self {
            config: config.clone(),
            vertices: MappedVecOfVecs::create_new(
                path(VERTICES_NAME).as_deref(),
                page_size,
            )?,
            vertex_table: MappedVec::create_new(
                path(VERTEX_TABLE_NAME).as_deref(),
                page_size,
            )?,
            edges: MappedVec::create_new(path(EDGES_NAME).as_deref(), page_size)?,
            edges_by_source: MappedVecOfVecs::create_new(
                path(EDGES_BY_SOURCE_NAME).as_deref(),
                page_size,
            )?,
        })
    }

    /// Open a marker graph persisted in `config.directory`. The vertex
    /// table is opened read-write so that the graph can be compacted;
    /// everything else is read-only.
    pub fn access_existing(config: &StorageConfig) -> Result<Self> {
        let dir = match &config.directory {
            Some(dir) => dir,
            None => panic!("cannot reopen a marker graph with anonymous storage"),
        };
        let graph = Self {
            config: config.clone(),
            vertices: MappedVecOfVecs::access_existing_read_only(
                &dir.join(VERTICES_NAME),
            )?,
            vertex_table: MappedVec::access_existing_read_write(
                &dir.join(VERTEX_TABLE_NAME),
            )?,
            edges: MappedVec::access_existing_read_only(&dir.join(EDGES_NAME))?,
            edges_by_source: MappedVecOfVecs::access_existing_read_only(
                &dir.join(EDGES_BY_SOURCE_NAME),
            )?,
        };
        info!(
            "opened marker graph in {} with {} vertices, {} markers, {} edges",
            dir.display(),
            graph.vertex_count(),
            graph.marker_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    #[inline]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Fill an empty graph with vertices, each given as its list of
    /// markers. Every marker must be below `marker_count` and belong
    /// to at most one vertex. The graph is left without edges.
    pub fn create_vertices<I, V>(&mut self, marker_count: usize, vertices: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[MarkerId]>,
    {
        assert!(
            self.vertices.is_empty() && self.vertex_table.is_empty(),
            "vertices can only be created in an empty marker graph"
        );

        self.vertex_table
            .resize(marker_count, CompressedVertexId::INVALID)?;

        for (ix, markers) in vertices.into_iter().enumerate() {
            let vertex = CompressedVertexId::from_index(ix);
            let markers = markers.as_ref();
            for &marker in markers {
                assert!(
                    (marker.0 as usize) < marker_count,
                    "marker {} of vertex {} is out of range, there are {} markers",
                    marker,
                    ix,
                    marker_count
                );
                let slot = &mut self.vertex_table[marker.0 as usize];
                assert!(
                    slot.is_invalid(),
                    "marker {} belongs to vertices {} and {}",
                    marker,
                    slot.get(),
                    ix
                );
                *slot = vertex;
            }
            self.vertices.append_vector(markers)?;
        }
        self.vertices.flush()?;
        self.vertex_table.flush()?;

        info!(
            "created {} marker graph vertices over {} markers",
            self.vertex_count(),
            marker_count
        );

        self.create_edges(&[])
    }

    /// The number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// The number of markers, whether or not they belong to a vertex.
    #[inline]
    pub fn marker_count(&self) -> usize {
        self.vertex_table.len()
    }

    /// The total number of markers over all vertices.
    #[inline]
    pub fn vertex_marker_total(&self) -> usize {
        self.vertices.total_size()
    }

    #[inline]
    fn check_vertex(&self, vertex: VertexId) -> CompressedVertexId {
        assert!(
            (vertex.0 as usize) < self.vertex_count(),
            "vertex {} does not exist, the marker graph has {} vertices",
            vertex,
            self.vertex_count()
        );
        CompressedVertexId::from(vertex)
    }

    /// The markers of `vertex`, in the order they were stored.
    #[inline]
    pub fn vertex_markers(&self, vertex: VertexId) -> &[MarkerId] {
        self.vertices.get(self.check_vertex(vertex))
    }

    /// The number of markers of `vertex`.
    #[inline]
    pub fn vertex_size(&self, vertex: VertexId) -> usize {
        self.vertices.size(self.check_vertex(vertex))
    }

    /// The vertex that `marker` belongs to, if any.
    #[inline]
    pub fn vertex_of_marker(&self, marker: MarkerId) -> Option<VertexId> {
        self.vertex_table[marker.0 as usize].vertex_id()
    }

    /// Iterate over all vertices with their markers.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &[MarkerId])> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .map(|(ix, markers)| (VertexId::from(ix), markers))
    }

    /// The raw reverse index, one entry per marker.
    #[inline]
    pub fn vertex_table(&self) -> &[CompressedVertexId] {
        self.vertex_table.as_slice()
    }
}

impl std::fmt::Debug for MarkerGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerGraph")
            .field("config", &self.config)
            .field("vertices", &self.vertices)
            .field("vertex_table", &self.vertex_table)
            .field("edges", &self.edges)
            .field("edges_by_source", &self.edges_by_source)
            .finish()
    }
}

/// Report a temporary generation that could not be removed after a
/// failed build. The error that caused the build to fail is the one
/// returned to the caller.
pub(crate) fn discard(removed: Result<()>) {
    if let Err(err) = removed {
        warn!("could not remove a temporary structure: {}", err);
    }
}

/// Replace `current` with `next`, which was built under a temporary
/// name. When the structure is file backed, the rename atomically
/// replaces the old files; the old mapping is only released once
/// that has succeeded.
pub(crate) fn publish_vec<T: Pod>(
    current: &mut MappedVec<T>,
    mut next: MappedVec<T>,
    path: Option<&Path>,
) -> Result<()> {
    let published = match path {
        Some(path) => {
            next.rename(path)?;
            next.close()?;
            MappedVec::access_existing_read_only(path)?
        }
        None => next.into_read_only()?,
    };
    let old = std::mem::replace(current, published);
    drop(old);
    Ok(())
}

/// Like [`publish_vec`], for a vector of vectors.
pub(crate) fn publish_vec_of_vecs<T: Pod, K: RecordKey>(
    current: &mut MappedVecOfVecs<T, K>,
    mut next: MappedVecOfVecs<T, K>,
    path: Option<&Path>,
) -> Result<()> {
    let published = match path {
        Some(path) => {
            next.rename(path)?;
            next.close()?;
            MappedVecOfVecs::access_existing_read_only(path)?
        }
        None => next.into_read_only()?,
    };
    let old = std::mem::replace(current, published);
    drop(old);
    Ok(())
}
