use std::io::Write;

use crate::pathgraph::PathGraph;

/// Width of an edge drawn for `coverage` traversals, truncated to an
/// integer as Graphviz expects.
#[inline]
fn pen_width(coverage: usize) -> u64 {
    (0.3 * coverage as f64) as u64
}

/// Write `graph` in Graphviz `dot` format, naming vertices by the ID
/// of the underlying marker graph vertex.
pub fn write_graphviz<W: Write>(graph: &PathGraph, mut out: W) -> std::io::Result<()> {
    writeln!(out, "digraph PathGraph {{")?;
    for (_, edge) in graph.edges() {
        writeln!(
            out,
            "{}->{} [penwidth={}];",
            graph.vertex(edge.source).vertex_id,
            graph.vertex(edge.target).vertex_id,
            pen_width(edge.coverage())
        )?;
    }
    writeln!(out, "}}")?;
    out.flush()
}
