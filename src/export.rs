/*!
Writers for a finished [`PathGraph`](crate::pathgraph::PathGraph).

These only read the graph, through its vertex and edge iterators:

* [`write_gfa`] writes GFA 1.0, one segment per vertex;
* [`write_vertices_csv`] and [`write_edges_csv`] write a table of
  vertices and one of edges;
* [`write_graphviz`] writes a `dot` file, with edges drawn thicker
  the more traversals use them;
* [`write_svg`] draws any graph implementing [`Layout`] directly,
  from the positions of its vertices.
*/

pub mod gfa;
pub mod graphviz;
pub mod svg;
pub mod tables;

pub use self::{
    gfa::write_gfa,
    graphviz::write_graphviz,
    svg::{write_svg, EdgeAttributes, Layout, VertexAttributes},
    tables::{write_edges_csv, write_vertices_csv},
};

#[cfg(test)]
pub(crate) mod test_graph {
    use crate::ids::VertexId;
    use crate::pathgraph::{Occurrence, PathGraph, PathVertex, PathVertexIx};

    /// Three vertices, with two traversals through 0 -> 1 and one of
    /// them continuing to 2.
    pub(crate) fn small() -> PathGraph {
        let mut graph = PathGraph::new();
        for (ix, &(vertex, segment, markers)) in
            [(4u64, 10u64, 3u64), (7, 11, 5), (9, 12, 2)].iter().enumerate()
        {
            let v = graph.add_vertex(PathVertex::new(VertexId(vertex), segment, markers));
            graph.vertex_mut(v).position = [ix as f64 * 10.0, 5.0];
        }
        let visits = vec![(0u64, vec![0usize, 1, 2]), (1, vec![0, 1])];
        for (traversal, path) in visits {
            for (ordinal, &v) in path.iter().enumerate() {
                graph
                    .vertex_mut(PathVertexIx(v))
                    .occurrences
                    .push(Occurrence::new(traversal, ordinal as u64));
            }
        }
        graph.create_edges().unwrap();
        graph
    }
}
