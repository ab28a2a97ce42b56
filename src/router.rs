use serde::Serialize;

use crate::{Footprint, Node, NodeTypeCatalog, PORT_INSET, Point, Workflow};

/// A node's input and output attachment points in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ports {
    pub input: Point,
    pub output: Point,
}

/// Cubic Bezier segment between two ports. Control points sit half the
/// horizontal distance inward with the endpoint's own y, so the curve leaves
/// and enters horizontally regardless of vertical offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CubicBezier {
    pub start: Point,
    pub control1: Point,
    pub control2: Point,
    pub end: Point,
}

impl CubicBezier {
    pub fn to_path(&self) -> String {
        format!(
            "M {:.1} {:.1} C {:.1} {:.1}, {:.1} {:.1}, {:.1} {:.1}",
            self.start.x,
            self.start.y,
            self.control1.x,
            self.control1.y,
            self.control2.x,
            self.control2.y,
            self.end.x,
            self.end.y
        )
    }
}

/// A connection resolved to concrete geometry for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedConnection {
    pub id: String,
    pub source: String,
    pub target: String,
    pub curve: CubicBezier,
}

/// Port coordinates for a node with the given footprint: a fixed inset
/// outward from each edge, vertically centered.
pub fn ports_of(node: &Node, footprint: Footprint) -> Ports {
    let mid_y = node.position.y + footprint.height / 2.0;
    Ports {
        input: Point::new(node.position.x - PORT_INSET, mid_y),
        output: Point::new(node.position.x + footprint.width + PORT_INSET, mid_y),
    }
}

pub fn path_between(start: Point, end: Point) -> CubicBezier {
    let reach = (end.x - start.x).abs() * 0.5;
    CubicBezier {
        start,
        control1: Point::new(start.x + reach, start.y),
        control2: Point::new(end.x - reach, end.y),
        end,
    }
}

/// Resolves every connection whose endpoints both exist to a Bezier between
/// the source's output port and the target's input port. The store already
/// prevents dangling edges; the filter here keeps rendering total over any
/// hand-built workflow document.
pub fn route(workflow: &Workflow, catalog: &NodeTypeCatalog) -> Vec<RoutedConnection> {
    workflow
        .connections
        .iter()
        .filter_map(|connection| {
            let source = workflow.node(&connection.source)?;
            let target = workflow.node(&connection.target)?;

            let start = ports_of(source, catalog.footprint_of(&source.kind)).output;
            let end = ports_of(target, catalog.footprint_of(&target.kind)).input;

            Some(RoutedConnection {
                id: connection.id.clone(),
                source: connection.source.clone(),
                target: connection.target.clone(),
                curve: path_between(start, end),
            })
        })
        .collect()
}
