use crate::{
    ids::{EdgeId, VertexId},
    markergraph::MarkerGraph,
};

use fnv::FnvHashSet;

use log::{error, info};

/// Check that the markers of the vertices and the vertex table agree:
/// every marker belongs to at most one vertex, and the table maps each
/// marker to its vertex, or to nothing.
pub fn validate_partition(graph: &MarkerGraph) -> bool {
    let mut success = true;
    let mut seen: FnvHashSet<u64> = FnvHashSet::default();

    for (vertex, markers) in graph.vertices() {
        if markers.is_empty() {
            info!("vertex {} has no markers", vertex);
            success = false;
        }
        for &marker in markers {
            if marker.0 as usize >= graph.marker_count() {
                info!(
                    "vertex {} has marker {} but there are only {} markers",
                    vertex,
                    marker,
                    graph.marker_count()
                );
                success = false;
                continue;
            }
            if !seen.insert(marker.0) {
                info!("marker {} is in more than one vertex", marker);
                success = false;
            }
            match graph.vertex_of_marker(marker) {
                Some(owner) if owner == vertex => (),
                Some(owner) => {
                    info!(
                        "marker {} of vertex {} is mapped to vertex {}",
                        marker, vertex, owner
                    );
                    success = false;
                }
                None => {
                    info!(
                        "marker {} of vertex {} is not in the vertex table",
                        marker, vertex
                    );
                    success = false;
                }
            }
        }
    }

    let assigned = graph
        .vertex_table()
        .iter()
        .filter(|id| !id.is_invalid())
        .count();
    if assigned != seen.len() {
        info!(
            "vertex table assigns {} markers, but the vertices hold {}",
            assigned,
            seen.len()
        );
        success = false;
    }

    success
}

/// Check that every edge joins two existing vertices, that no ordered
/// pair has two edges, and that each edge is listed exactly once, as
/// an out edge of its source.
pub fn validate_edges(graph: &MarkerGraph) -> bool {
    let mut success = true;
    let vertex_count = graph.vertex_count();
    let mut pairs: FnvHashSet<(VertexId, VertexId)> = FnvHashSet::default();

    for (id, edge) in graph.edges() {
        let (source, target) = (edge.source(), edge.target());
        if source.0 as usize >= vertex_count || target.0 as usize >= vertex_count {
            info!(
                "edge {} from {} to {} has a missing endpoint",
                id, source, target
            );
            success = false;
            continue;
        }
        if !pairs.insert((source, target)) {
            info!("more than one edge from {} to {}", source, target);
            success = false;
        }
        let listed = graph
            .out_edges(source)
            .iter()
            .filter(|&&out| out == id)
            .count();
        if listed != 1 {
            info!(
                "edge {} is listed {} times among the out edges of {}",
                id, listed, source
            );
            success = false;
        }
    }

    let listed: usize = (0..vertex_count)
        .map(|v| graph.out_edges(VertexId::from(v)).len())
        .sum();
    if listed != graph.edge_count() {
        info!(
            "out edge lists hold {} entries for {} edges",
            listed,
            graph.edge_count()
        );
        success = false;
    }

    for v in 0..vertex_count {
        let vertex = VertexId::from(v);
        for &EdgeId(e) in graph.out_edges(vertex) {
            if e as usize >= graph.edge_count() {
                info!("vertex {} lists missing edge {}", vertex, e);
                success = false;
            }
        }
    }

    success
}

/// Run every check on `graph`, logging the outcome.
pub fn validate(graph: &MarkerGraph) -> bool {
    info!("validating marker graph");

    let partition = validate_partition(graph);
    let edges = validate_edges(graph);

    if partition && edges {
        info!("marker graph successfully validated");
        true
    } else {
        error!("errors when validating marker graph");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::{CompactionOptions, StorageConfig};
    use crate::ids::MarkerId;

    #[test]
    fn built_graph_is_valid() {
        let mut graph = MarkerGraph::create_new(&StorageConfig::anonymous()).unwrap();
        graph
            .create_vertices(
                6,
                vec![
                    vec![MarkerId(0), MarkerId(3)],
                    vec![MarkerId(1)],
                    vec![MarkerId(5), MarkerId(2)],
                ],
            )
            .unwrap();
        graph
            .create_edges(&[(VertexId(0), VertexId(1)), (VertexId(1), VertexId(2))])
            .unwrap();
        assert!(validate(&graph));

        graph
            .remove_vertices(&[VertexId(1), VertexId(2)], &CompactionOptions::new(4096, 2))
            .unwrap();
        assert!(validate(&graph));
        assert_eq!(graph.edge_count(), 1);
    }
}
