use markergraph::{
    config::{CompactionOptions, StorageConfig},
    ids::{EdgeId, MarkerId, VertexId},
    markergraph::MarkerGraph,
    util::validate::validate,
};

fn markers(ids: &[u64]) -> Vec<MarkerId> {
    ids.iter().copied().map(MarkerId).collect()
}

/// Eight markers in four vertices, marker 7 unassigned, and a cycle
/// of edges with one chord.
fn build(config: &StorageConfig) -> MarkerGraph {
    let mut graph = MarkerGraph::create_new(config).unwrap();
    graph
        .create_vertices(
            8,
            vec![
                markers(&[0, 4]),
                markers(&[1]),
                markers(&[2, 5, 6]),
                markers(&[3]),
            ],
        )
        .unwrap();
    graph
        .create_edges(&[
            (VertexId(0), VertexId(1)),
            (VertexId(1), VertexId(2)),
            (VertexId(2), VertexId(3)),
            (VertexId(3), VertexId(0)),
            (VertexId(0), VertexId(2)),
        ])
        .unwrap();
    graph
}

fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn stored_graph_can_be_reopened() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::in_directory(dir.path());
    let graph = build(&config);
    assert!(validate(&graph));
    drop(graph);

    assert_eq!(
        file_names(dir.path()),
        vec![
            "edges",
            "edgesBySource.data",
            "edgesBySource.toc",
            "vertexTable",
            "vertices.data",
            "vertices.toc",
        ]
    );

    let graph = MarkerGraph::access_existing(&config).unwrap();
    assert_eq!(graph.vertex_count(), 4);
    assert_eq!(graph.marker_count(), 8);
    assert_eq!(graph.vertex_markers(VertexId(2)), markers(&[2, 5, 6]).as_slice());
    assert_eq!(graph.vertex_of_marker(MarkerId(7)), None);
    assert_eq!(graph.find_edge_id(VertexId(0), VertexId(2)), EdgeId(4));
    assert!(validate(&graph));
}

#[test]
fn compaction_on_disk_leaves_no_temporary_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::in_directory(dir.path());
    let mut graph = build(&config);

    let options = CompactionOptions::new(4096, 3).with_batch_size(1);
    graph
        .remove_vertices(&[VertexId(3), VertexId(2), VertexId(0)], &options)
        .unwrap();

    assert!(file_names(dir.path()).iter().all(|name| !name.ends_with("-tmp")
        && !name.contains("-tmp.")));

    assert_eq!(graph.vertex_count(), 3);
    assert_eq!(graph.vertex_markers(VertexId(0)), markers(&[3]).as_slice());
    assert_eq!(graph.vertex_markers(VertexId(1)), markers(&[2, 5, 6]).as_slice());
    assert_eq!(graph.vertex_markers(VertexId(2)), markers(&[0, 4]).as_slice());
    assert_eq!(graph.vertex_of_marker(MarkerId(1)), None);
    assert_eq!(graph.vertex_of_marker(MarkerId(6)), Some(VertexId(1)));

    // 2->3, 3->0 and 0->2 survive, as 1->0, 0->2 and 2->1.
    assert_eq!(graph.edge_count(), 3);
    assert_eq!(graph.find_edge_id(VertexId(1), VertexId(0)), EdgeId(0));
    assert_eq!(graph.find_edge_id(VertexId(0), VertexId(2)), EdgeId(1));
    assert_eq!(graph.find_edge_id(VertexId(2), VertexId(1)), EdgeId(2));
    assert!(validate(&graph));
    drop(graph);

    let reopened = MarkerGraph::access_existing(&config).unwrap();
    assert_eq!(reopened.vertex_count(), 3);
    assert_eq!(reopened.vertex_marker_total(), 6);
    assert_eq!(reopened.vertex_of_marker(MarkerId(3)), Some(VertexId(0)));
    assert_eq!(reopened.edge_count(), 3);
    assert!(validate(&reopened));
}

fn assert_unchanged(graph: &MarkerGraph) {
    assert_eq!(graph.vertex_count(), 4);
    assert_eq!(graph.marker_count(), 8);
    assert_eq!(graph.vertex_markers(VertexId(2)), markers(&[2, 5, 6]).as_slice());
    assert_eq!(graph.vertex_of_marker(MarkerId(4)), Some(VertexId(0)));
    assert_eq!(graph.edge_count(), 5);
    assert_eq!(graph.find_edge_id(VertexId(0), VertexId(2)), EdgeId(4));
    assert!(validate(graph));
}

#[test]
fn failed_edge_rebuild_leaves_graph_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::in_directory(dir.path());
    let mut graph = build(&config);

    // A directory in the way of the new edges makes their creation fail
    // after the new vertices have been built.
    let blocker = dir.path().join("edges-tmp");
    std::fs::create_dir(&blocker).unwrap();

    let keep = [VertexId(3), VertexId(0)];
    let options = CompactionOptions::new(4096, 2);
    assert!(graph.remove_vertices(&keep, &options).is_err());

    assert_unchanged(&graph);
    assert_eq!(
        file_names(dir.path()),
        vec![
            "edges",
            "edges-tmp",
            "edgesBySource.data",
            "edgesBySource.toc",
            "vertexTable",
            "vertices.data",
            "vertices.toc",
        ]
    );

    std::fs::remove_dir(&blocker).unwrap();
    graph.remove_vertices(&keep, &options).unwrap();
    assert_eq!(graph.vertex_count(), 2);
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.find_edge_id(VertexId(0), VertexId(1)), EdgeId(0));
    assert!(validate(&graph));
}

#[test]
fn failed_edge_creation_removes_temporary_edges() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::in_directory(dir.path());
    let mut graph = build(&config);

    std::fs::create_dir(dir.path().join("edgesBySource-tmp.toc")).unwrap();
    assert!(graph.create_edges(&[(VertexId(1), VertexId(3))]).is_err());

    assert_unchanged(&graph);
    assert!(!dir.path().join("edges-tmp").exists());
    assert!(!dir.path().join("edgesBySource-tmp.data").exists());
}

#[test]
fn reopened_graph_can_be_compacted() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::in_directory(dir.path());
    drop(build(&config));

    let mut graph = MarkerGraph::access_existing(&config).unwrap();
    graph
        .remove_vertices(&[VertexId(1)], &CompactionOptions::default())
        .unwrap();
    assert_eq!(graph.vertex_count(), 1);
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.vertex_of_marker(MarkerId(1)), Some(VertexId(0)));
    assert!(validate(&graph));
}

#[test]
fn on_disk_and_anonymous_agree() {
    let dir = tempfile::tempdir().unwrap();
    let mut on_disk = build(&StorageConfig::in_directory(dir.path()).with_page_size(64));
    let mut anonymous = build(&StorageConfig::anonymous());

    let keep = [VertexId(2), VertexId(1)];
    let options = CompactionOptions::new(64, 2);
    on_disk.remove_vertices(&keep, &options).unwrap();
    anonymous.remove_vertices(&keep, &options).unwrap();

    assert!(on_disk.vertices().eq(anonymous.vertices()));
    assert_eq!(on_disk.vertex_table(), anonymous.vertex_table());
    assert!(on_disk.edges().eq(anonymous.edges()));
}

#[test]
#[should_panic]
fn anonymous_graph_cannot_be_reopened() {
    let _ = MarkerGraph::access_existing(&StorageConfig::anonymous());
}
