use std::io::Write;

use crate::pathgraph::PathGraph;

/// Write `graph` as GFA 1.0. Each vertex is a segment named by its
/// segment ID, with its marker count as its length, and each edge a
/// link between the forward strands of its endpoints.
pub fn write_gfa<W: Write>(graph: &PathGraph, mut out: W) -> std::io::Result<()> {
    writeln!(out, "H\tVN:Z:1.0")?;

    for (_, vertex) in graph.vertices() {
        writeln!(
            out,
            "S\t{}\t*\tLN:i:{}",
            vertex.segment_id, vertex.marker_count
        )?;
    }

    for (ix, _) in graph.vertices() {
        let source = graph.vertex(ix);
        for &edge in graph.out_edges(ix) {
            let target = graph.vertex(graph.edge(edge).target);
            writeln!(
                out,
                "L\t{}\t+\t{}\t+\t*",
                source.segment_id, target.segment_id
            )?;
        }
    }

    out.flush()
}
