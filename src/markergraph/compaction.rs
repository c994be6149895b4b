/*!
Removal of vertices from the marker graph.

The kept vertices are renumbered densely, in the order they are given,
and every structure of the graph is rebuilt from scratch. The new
`vertices` store is built in parallel with the two-pass protocol of
[`MappedVecOfVecs`]: the workers first count the markers of each new
vertex, then copy them into the slots allocated from those counts.
Each worker only ever touches the new vertex IDs of the batches it
claims, so the passes need no locking.

The edges whose endpoints both survive are renumbered into a new
generation as well. Only once both generations are complete are they
published over the old ones.

The vertex table is then refilled, again in parallel. Since each
marker belongs to at most one vertex, each of its entries is written
by at most one worker.
*/

use std::time::Instant;

use log::{debug, info};

use super::{
    discard, edges::build_edges, publish_vec_of_vecs, Edge, MarkerGraph,
    VERTICES_NAME,
};
use crate::{
    config::CompactionOptions,
    ids::{CompressedVertexId, EdgeId, MarkerId, RecordKey, VertexId},
    mapped::{temporary_path, MappedVec, MappedVecOfVecs, Result},
    parallel::{DisjointWriter, WorkerPool},
};

type EdgeGeneration = (MappedVec<Edge>, MappedVecOfVecs<EdgeId, CompressedVertexId>);

impl MarkerGraph {
    /// Keep only the vertices in `keep`, which become vertices
    /// `0..keep.len()` in that order. Markers of the other vertices
    /// are left without a vertex, and edges touching them are
    /// dropped.
    ///
    /// Every ID in `keep` must be an existing vertex and appear at
    /// most once. If an error is returned before the new vertices and
    /// edges are published, the graph is unchanged and no temporary
    /// files are left behind.
    pub fn remove_vertices(
        &mut self,
        keep: &[VertexId],
        options: &CompactionOptions,
    ) -> Result<()> {
        let started = Instant::now();
        let old_vertex_count = self.vertex_count();
        let old_edge_count = self.edge_count();

        let new_ids = self.renumbering(keep)?;

        let pool = WorkerPool::new(options.effective_thread_count())?;
        info!(
            "keeping {} of {} vertices using {} threads",
            keep.len(),
            old_vertex_count,
            pool.thread_count()
        );

        let new_vertices = self.copy_vertices(keep, options, &pool)?;
        debug!(
            "copied {} markers into {} vertices in {:.2?}",
            new_vertices.total_size(),
            new_vertices.len(),
            started.elapsed()
        );

        let (new_edges, new_by_source) =
            match self.renumbered_edges(&new_ids, keep.len(), options) {
                Ok(generation) => generation,
                Err(err) => {
                    discard(new_vertices.remove());
                    return Err(err);
                }
            };

        publish_vec_of_vecs(
            &mut self.vertices,
            new_vertices,
            self.config.path(VERTICES_NAME).as_deref(),
        )?;
        self.publish_edges(new_edges, new_by_source)?;

        let repair_started = Instant::now();
        self.rebuild_vertex_table(options, &pool)?;
        debug!("rebuilt the vertex table in {:.2?}", repair_started.elapsed());

        info!(
            "compacted marker graph to {} vertices, {} markers, {} of {} edges in {:.2?}",
            self.vertex_count(),
            self.vertex_marker_total(),
            self.edge_count(),
            old_edge_count,
            started.elapsed()
        );
        Ok(())
    }

    /// Check `keep` and map each old vertex ID to its new ID, or to
    /// the sentinel for removed vertices.
    fn renumbering(&self, keep: &[VertexId]) -> Result<MappedVec<CompressedVertexId>> {
        let vertex_count = self.vertex_count();
        let mut new_ids = MappedVec::create_new(None, self.config.page_size)?;
        new_ids.resize(vertex_count, CompressedVertexId::INVALID)?;

        for (new_ix, &old) in keep.iter().enumerate() {
            assert!(
                (old.0 as usize) < vertex_count,
                "cannot keep vertex {}, the marker graph has {} vertices",
                old,
                vertex_count
            );
            let slot = &mut new_ids[old.0 as usize];
            assert!(
                slot.is_invalid(),
                "vertex {} is kept more than once",
                old
            );
            *slot = CompressedVertexId::from_index(new_ix);
        }
        Ok(new_ids)
    }

    /// Build the new `vertices` under its temporary name, removing it
    /// again if that fails.
    fn copy_vertices(
        &self,
        keep: &[VertexId],
        options: &CompactionOptions,
        pool: &WorkerPool,
    ) -> Result<MappedVecOfVecs<MarkerId, CompressedVertexId>> {
        let path = self
            .config
            .path(VERTICES_NAME)
            .map(|path| temporary_path(&path));
        let mut new_vertices =
            MappedVecOfVecs::create_new(path.as_deref(), options.page_size)?;

        match self.fill_vertices(&mut new_vertices, keep, options, pool) {
            Ok(()) => Ok(new_vertices),
            Err(err) => {
                discard(new_vertices.remove());
                Err(err)
            }
        }
    }

    fn fill_vertices(
        &self,
        new_vertices: &mut MappedVecOfVecs<MarkerId, CompressedVertexId>,
        keep: &[VertexId],
        options: &CompactionOptions,
        pool: &WorkerPool,
    ) -> Result<()> {
        let old_vertices = &self.vertices;

        new_vertices.begin_pass1(keep.len())?;
        {
            let counters = new_vertices.counters();
            pool.run_batches(keep.len(), options.batch_size, |batch| {
                for new_ix in batch {
                    let old = CompressedVertexId::from(keep[new_ix]);
                    let size = old_vertices.size(old) as u64;
                    // SAFETY: batches are disjoint, so no other worker
                    // counts this new vertex.
                    unsafe {
                        counters.increment_count(
                            CompressedVertexId::from_index(new_ix),
                            size,
                        )
                    };
                }
            });
        }

        new_vertices.begin_pass2()?;
        {
            let filler = new_vertices.filler();
            pool.run_batches(keep.len(), options.batch_size, |batch| {
                for new_ix in batch {
                    let old = CompressedVertexId::from(keep[new_ix]);
                    // SAFETY: as above, the slot belongs to this batch.
                    let slot = unsafe {
                        filler.slot_mut(CompressedVertexId::from_index(new_ix))
                    };
                    slot.copy_from_slice(old_vertices.get(old));
                }
            });
        }
        new_vertices.end_pass2()
    }

    /// Build the new `edges` and `edgesBySource` under their temporary
    /// names, keeping the edges between surviving vertices, in their
    /// current order, with their endpoints renumbered.
    fn renumbered_edges(
        &self,
        new_ids: &MappedVec<CompressedVertexId>,
        new_vertex_count: usize,
        options: &CompactionOptions,
    ) -> Result<EdgeGeneration> {
        let mut kept: MappedVec<Edge> = MappedVec::create_new(None, options.page_size)?;
        for edge in self.edges.iter() {
            let source = new_ids[edge.source.to_index()];
            let target = new_ids[edge.target.to_index()];
            if !source.is_invalid() && !target.is_invalid() {
                kept.push(Edge { source, target })?;
            }
        }
        build_edges(&self.config, options.page_size, new_vertex_count, kept.as_slice())
    }

    /// Reset the vertex table to the sentinel, then point every
    /// marker of every vertex back at it.
    fn rebuild_vertex_table(
        &mut self,
        options: &CompactionOptions,
        pool: &WorkerPool,
    ) -> Result<()> {
        self.vertex_table.fill(CompressedVertexId::INVALID);

        let vertices = &self.vertices;
        let table = DisjointWriter::new(self.vertex_table.as_mut_slice());
        pool.run_batches(vertices.len(), options.batch_size, |batch| {
            for ix in batch {
                let vertex = CompressedVertexId::from_index(ix);
                for &marker in vertices.get(vertex) {
                    // SAFETY: a marker belongs to a single vertex, and
                    // each vertex is in a single batch.
                    unsafe { table.write(marker.0 as usize, vertex) };
                }
            }
        });

        self.vertex_table.flush()
    }
}
