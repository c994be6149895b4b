use std::fmt;
use std::hash::Hash;
use std::io::Write;

use fnv::FnvHashMap;

use crate::pathgraph::{PathEdgeIx, PathGraph, PathVertexIx};

/// A graph whose vertices have been given positions in the plane.
pub trait Layout {
    type Vertex: Copy + Eq + Hash;
    type Edge: Copy + Eq + Hash;

    fn layout_vertices(&self) -> Box<dyn Iterator<Item = Self::Vertex> + '_>;

    fn layout_edges(&self) -> Box<dyn Iterator<Item = Self::Edge> + '_>;

    fn position(&self, vertex: Self::Vertex) -> [f64; 2];

    fn endpoints(&self, edge: Self::Edge) -> (Self::Vertex, Self::Vertex);
}

impl Layout for PathGraph {
    type Vertex = PathVertexIx;
    type Edge = PathEdgeIx;

    fn layout_vertices(&self) -> Box<dyn Iterator<Item = PathVertexIx> + '_> {
        Box::new(self.vertices().map(|(ix, _)| ix))
    }

    fn layout_edges(&self) -> Box<dyn Iterator<Item = PathEdgeIx> + '_> {
        Box::new(self.edges().map(|(ix, _)| ix))
    }

    #[inline]
    fn position(&self, vertex: PathVertexIx) -> [f64; 2] {
        self.vertex(vertex).position
    }

    #[inline]
    fn endpoints(&self, edge: PathEdgeIx) -> (PathVertexIx, PathVertexIx) {
        let edge = self.edge(edge);
        (edge.source, edge.target)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttributes {
    pub radius: f64,
    pub id: String,
    pub color: String,
    pub tooltip: String,
    pub url: String,
}

impl Default for VertexAttributes {
    fn default() -> Self {
        Self {
            radius: 1.0,
            id: String::new(),
            color: "black".to_string(),
            tooltip: String::new(),
            url: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeAttributes {
    pub thickness: f64,
    pub id: String,
    pub color: String,
    pub tooltip: String,
    pub url: String,
}

impl Default for EdgeAttributes {
    fn default() -> Self {
        Self {
            thickness: 1.0,
            id: String::new(),
            color: "black".to_string(),
            tooltip: String::new(),
            url: String::new(),
        }
    }
}

/// Text escaped for use in an XML attribute or element.
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        while let Some(ix) = rest.find(|c: char| matches!(c, '&' | '<' | '>' | '\'' | '"')) {
            f.write_str(&rest[..ix])?;
            let entity = match rest.as_bytes()[ix] {
                b'&' => "&amp;",
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'\'' => "&apos;",
                _ => "&quot;",
            };
            f.write_str(entity)?;
            rest = &rest[ix + 1..];
        }
        f.write_str(rest)
    }
}

/// The view box `[x, y, width, height]` containing every vertex with
/// its radius, or all zeros for an empty graph.
fn view_box<L: Layout>(
    graph: &L,
    attributes: &FnvHashMap<L::Vertex, VertexAttributes>,
    default: &VertexAttributes,
) -> [f64; 4] {
    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];

    for vertex in graph.layout_vertices() {
        let radius = attributes.get(&vertex).unwrap_or(default).radius;
        let position = graph.position(vertex);
        for i in 0..2 {
            min[i] = min[i].min(position[i] - radius);
            max[i] = max[i].max(position[i] + radius);
        }
    }

    if min[0] > max[0] {
        [0.0; 4]
    } else {
        [min[0], min[1], max[0] - min[0], max[1] - min[1]]
    }
}

/// Draw `graph` as an SVG element with the given ID and size. Edges
/// are drawn as straight lines below the vertices; vertices and edges
/// without attributes get the defaults.
pub fn write_svg<L: Layout, W: Write>(
    graph: &L,
    svg_id: &str,
    width: u64,
    height: u64,
    vertex_attributes: &FnvHashMap<L::Vertex, VertexAttributes>,
    edge_attributes: &FnvHashMap<L::Edge, EdgeAttributes>,
    mut out: W,
) -> std::io::Result<()> {
    let default_vertex = VertexAttributes::default();
    let default_edge = EdgeAttributes::default();
    let svg_id = Escaped(svg_id);

    let [x, y, w, h] = view_box(graph, vertex_attributes, &default_vertex);
    writeln!(
        out,
        "<svg id='{}' width='{}' height='{}' viewbox='{} {} {} {}'>",
        svg_id, width, height, x, y, w, h
    )?;

    writeln!(out, "<g id='{}-edges'>", svg_id)?;
    for edge in graph.layout_edges() {
        let attributes = edge_attributes.get(&edge).unwrap_or(&default_edge);
        let (source, target) = graph.endpoints(edge);
        let [x1, y1] = graph.position(source);
        let [x2, y2] = graph.position(target);

        write!(out, "<line x1='{}' y1='{}' x2='{}' y2='{}'", x1, y1, x2, y2)?;
        if !attributes.id.is_empty() {
            write!(out, " id='{}'", Escaped(&attributes.id))?;
        }
        write!(
            out,
            " stroke='{}' stroke-width='{}'>",
            Escaped(&attributes.color),
            attributes.thickness
        )?;
        if !attributes.tooltip.is_empty() {
            write!(out, "<title>{}</title>", Escaped(&attributes.tooltip))?;
        }
        writeln!(out, "</line>")?;
    }
    writeln!(out, "</g>")?;

    writeln!(out, "<g id='{}-vertices' stroke='none'>", svg_id)?;
    for vertex in graph.layout_vertices() {
        let attributes = vertex_attributes.get(&vertex).unwrap_or(&default_vertex);
        let [cx, cy] = graph.position(vertex);

        if !attributes.url.is_empty() {
            write!(out, "<a href='{}'>", Escaped(&attributes.url))?;
        }
        write!(out, "<circle cx='{}' cy='{}' r='{}'", cx, cy, attributes.radius)?;
        if !attributes.id.is_empty() {
            write!(out, " id='{}'", Escaped(&attributes.id))?;
        }
        write!(out, " fill='{}'>", Escaped(&attributes.color))?;
        if !attributes.tooltip.is_empty() {
            write!(out, "<title>{}</title>", Escaped(&attributes.tooltip))?;
        }
        write!(out, "</circle>")?;
        if !attributes.url.is_empty() {
            write!(out, "</a>")?;
        }
        writeln!(out)?;
    }
    writeln!(out, "</g>")?;

    writeln!(out, "</svg>")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::export::test_graph;

    fn render(
        graph: &PathGraph,
        vertices: &FnvHashMap<PathVertexIx, VertexAttributes>,
        edges: &FnvHashMap<PathEdgeIx, EdgeAttributes>,
    ) -> String {
        let mut out = Vec::new();
        write_svg(graph, "g", 800, 600, vertices, edges, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn view_box_includes_radii() {
        let graph = test_graph::small();
        let mut vertices = FnvHashMap::default();
        vertices.insert(
            PathVertexIx(2),
            VertexAttributes {
                radius: 3.0,
                ..Default::default()
            },
        );
        let svg = render(&graph, &vertices, &FnvHashMap::default());
        let first = svg.lines().next().unwrap();
        assert_eq!(
            first,
            "<svg id='g' width='800' height='600' viewbox='-1 2 24 6'>"
        );
    }

    #[test]
    fn edges_are_drawn_before_vertices() {
        let graph = test_graph::small();
        let mut edges = FnvHashMap::default();
        edges.insert(
            PathEdgeIx(0),
            EdgeAttributes {
                id: "e0".to_string(),
                tooltip: "two reads".to_string(),
                thickness: 2.5,
                ..Default::default()
            },
        );
        let mut vertices = FnvHashMap::default();
        vertices.insert(
            PathVertexIx(1),
            VertexAttributes {
                color: "red".to_string(),
                url: "#v1".to_string(),
                ..Default::default()
            },
        );
        let svg = render(&graph, &vertices, &edges);
        let lines: Vec<&str> = svg.lines().collect();

        assert_eq!(lines[1], "<g id='g-edges'>");
        assert_eq!(
            lines[2],
            "<line x1='0' y1='5' x2='10' y2='5' id='e0' stroke='black' \
             stroke-width='2.5'><title>two reads</title></line>"
        );
        assert_eq!(
            lines[3],
            "<line x1='10' y1='5' x2='20' y2='5' stroke='black' stroke-width='1'></line>"
        );
        assert_eq!(lines[4], "</g>");
        assert_eq!(lines[5], "<g id='g-vertices' stroke='none'>");
        assert_eq!(
            lines[7],
            "<a href='#v1'><circle cx='10' cy='5' r='1' fill='red'></circle></a>"
        );
        assert_eq!(lines.last(), Some(&"</svg>"));
    }

    #[test]
    fn empty_graph_has_empty_view_box() {
        let graph = PathGraph::new();
        let svg = render(&graph, &FnvHashMap::default(), &FnvHashMap::default());
        assert!(svg.starts_with("<svg id='g' width='800' height='600' viewbox='0 0 0 0'>"));
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(Escaped("plain").to_string(), "plain");
        assert_eq!(
            Escaped("a<b & 'c'>\"d\"").to_string(),
            "a&lt;b &amp; &apos;c&apos;&gt;&quot;d&quot;"
        );

        let graph = test_graph::small();
        let mut vertices = FnvHashMap::default();
        vertices.insert(
            PathVertexIx(0),
            VertexAttributes {
                id: "v'0".to_string(),
                tooltip: "<b>&</b>".to_string(),
                url: "?a=1&b=2".to_string(),
                ..Default::default()
            },
        );
        let mut out = Vec::new();
        write_svg(
            &graph,
            "g'",
            800,
            600,
            &vertices,
            &FnvHashMap::default(),
            &mut out,
        )
        .unwrap();
        let svg = String::from_utf8(out).unwrap();

        assert!(svg.starts_with("<svg id='g&apos;' "));
        assert!(svg.contains("<g id='g&apos;-edges'>"));
        assert!(svg.contains(
            "<a href='?a=1&amp;b=2'><circle cx='0' cy='5' r='1' id='v&apos;0' \
             fill='black'><title>&lt;b&gt;&amp;&lt;/b&gt;</title></circle></a>"
        ));
    }
}
