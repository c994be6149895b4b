use std::io::Write;

use crate::pathgraph::PathGraph;

/// Write one row per vertex, with its coverage, i.e. its number of
/// visits.
pub fn write_vertices_csv<W: Write>(graph: &PathGraph, out: W) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&[
        "VertexId",
        "Segment id",
        "Marker count",
        "Coverage",
        "Segment id and coverage",
    ])?;

    for (_, vertex) in graph.vertices() {
        let coverage = vertex.coverage();
        writer.write_record(&[
            vertex.vertex_id.to_string(),
            vertex.segment_id.to_string(),
            vertex.marker_count.to_string(),
            coverage.to_string(),
            format!("{}/{}", vertex.segment_id, coverage),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write one row per edge, naming its endpoints by their marker graph
/// vertex IDs.
pub fn write_edges_csv<W: Write>(graph: &PathGraph, out: W) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&["VertexId0", "VertexId1", "Coverage"])?;

    for (_, edge) in graph.edges() {
        writer.write_record(&[
            graph.vertex(edge.source).vertex_id.to_string(),
            graph.vertex(edge.target).vertex_id.to_string(),
            edge.coverage().to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::export::test_graph;

    #[test]
    fn vertex_table() {
        let graph = test_graph::small();
        let mut out = Vec::new();
        write_vertices_csv(&graph, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "VertexId,Segment id,Marker count,Coverage,Segment id and coverage\n\
             4,10,3,2,10/2\n\
             7,11,5,2,11/2\n\
             9,12,2,1,12/1\n"
        );
    }

    #[test]
    fn edge_table() {
        let graph = test_graph::small();
        let mut out = Vec::new();
        write_edges_csv(&graph, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "VertexId0,VertexId1,Coverage\n4,7,2\n7,9,1\n"
        );
    }
}
