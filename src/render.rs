use std::fmt::Write as FmtWrite;

use anyhow::Result;
#[cfg(feature = "server")]
use anyhow::{anyhow, bail};
#[cfg(feature = "server")]
use tiny_skia::{Pixmap, Transform};

use crate::{
    CONNECTION_STROKE, CONNECTION_STROKE_WIDTH, CanvasSize, EMPTY_CANVAS_SIZE, ICON_BLOCK_SIZE,
    ICON_CORNER_RADIUS, LAYOUT_MARGIN, NODE_CORNER_RADIUS, NODE_LABEL_OFFSET, NodeStatus,
    NodeTypeCatalog, PORT_RADIUS, STATUS_DOT_RADIUS, Workflow, escape_xml, ports_of, route,
};

/// Canvas extent needed to fit every node footprint plus margin.
pub fn canvas_size(workflow: &Workflow, catalog: &NodeTypeCatalog) -> CanvasSize {
    if workflow.nodes.is_empty() {
        return CanvasSize {
            width: EMPTY_CANVAS_SIZE,
            height: EMPTY_CANVAS_SIZE,
        };
    }

    let mut max_x: f32 = 0.0;
    let mut max_y: f32 = 0.0;
    for node in &workflow.nodes {
        let footprint = catalog.footprint_of(&node.kind);
        max_x = max_x.max(node.position.x + footprint.width);
        max_y = max_y.max(node.position.y + footprint.height + NODE_LABEL_OFFSET);
    }

    CanvasSize {
        width: max_x + LAYOUT_MARGIN,
        height: max_y + LAYOUT_MARGIN,
    }
}

/// Renders the workflow to a standalone SVG document: routed connections
/// first, then nodes with their ports, icon block, status dot and label.
pub fn render_svg(
    workflow: &Workflow,
    catalog: &NodeTypeCatalog,
    background: &str,
) -> Result<String> {
    let size = canvas_size(workflow, catalog);

    let mut svg = String::new();
    write!(
        svg,
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}" font-family="Inter, system-ui, sans-serif">
  <title>{}</title>
  <defs>
        <marker id="arrowhead" markerWidth="8" markerHeight="6" refX="7" refY="3" orient="auto">
            <polygon points="0 0, 8 3, 0 6" fill="{}" />
        </marker>
  </defs>
  <rect width="100%" height="100%" fill="{}" />
"##,
        size.width,
        size.height,
        size.width,
        size.height,
        escape_xml(&workflow.name),
        CONNECTION_STROKE,
        escape_xml(background)
    )?;

    for routed in route(workflow, catalog) {
        write!(
            svg,
            "  <path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{:.0}\" marker-end=\"url(#arrowhead)\" />\n",
            routed.curve.to_path(),
            CONNECTION_STROKE,
            CONNECTION_STROKE_WIDTH
        )?;
    }

    for node in &workflow.nodes {
        let footprint = catalog.footprint_of(&node.kind);
        let kind = catalog.kind(&node.kind);
        let ports = ports_of(node, footprint);

        let border = if node.selected {
            "#3b82f6"
        } else {
            match node.status {
                NodeStatus::Running => "#60a5fa",
                NodeStatus::Error => "#f87171",
                NodeStatus::Idle | NodeStatus::Success => "#d1d5db",
            }
        };

        write!(
            svg,
            "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"{:.0}\" ry=\"{:.0}\" fill=\"white\" stroke=\"{}\" stroke-width=\"2\" />\n",
            node.position.x,
            node.position.y,
            footprint.width,
            footprint.height,
            NODE_CORNER_RADIUS,
            NODE_CORNER_RADIUS,
            border
        )?;

        for port in [ports.input, ports.output] {
            write!(
                svg,
                "  <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"{:.0}\" fill=\"#4b5563\" stroke=\"white\" stroke-width=\"2\" />\n",
                port.x, port.y, PORT_RADIUS
            )?;
        }

        let icon_x = node.position.x + (footprint.width - ICON_BLOCK_SIZE) / 2.0;
        let icon_y = node.position.y + (footprint.height - ICON_BLOCK_SIZE) / 2.0;
        let icon_color = kind.map(|kind| kind.color.as_str()).unwrap_or("#6b7280");
        write!(
            svg,
            "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.0}\" height=\"{:.0}\" rx=\"{:.0}\" ry=\"{:.0}\" fill=\"{}\" />\n",
            icon_x,
            icon_y,
            ICON_BLOCK_SIZE,
            ICON_BLOCK_SIZE,
            ICON_CORNER_RADIUS,
            ICON_CORNER_RADIUS,
            escape_xml(icon_color)
        )?;

        if node.status != NodeStatus::Idle {
            let dot_color = match node.status {
                NodeStatus::Running => "#3b82f6",
                NodeStatus::Success => "#22c55e",
                NodeStatus::Error => "#ef4444",
                NodeStatus::Idle => unreachable!(),
            };
            write!(
                svg,
                "  <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"{:.0}\" fill=\"{}\" stroke=\"white\" stroke-width=\"2\" />\n",
                node.position.x + footprint.width,
                node.position.y,
                STATUS_DOT_RADIUS,
                dot_color
            )?;
        }

        let label = kind.map(|kind| kind.name.as_str()).unwrap_or("Unknown Node");
        write!(
            svg,
            "  <text x=\"{:.1}\" y=\"{:.1}\" fill=\"#1a202c\" font-size=\"13\" text-anchor=\"middle\">{}</text>\n",
            node.position.x + footprint.width / 2.0,
            node.position.y + footprint.height + NODE_LABEL_OFFSET,
            escape_xml(label)
        )?;
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Rasterizes the SVG rendering to PNG at the given scale.
#[cfg(feature = "server")]
pub fn render_png(
    workflow: &Workflow,
    catalog: &NodeTypeCatalog,
    background: &str,
    scale: f32,
) -> Result<Vec<u8>> {
    if scale <= 0.0 {
        bail!("scale must be greater than zero when rendering PNG output");
    }

    let svg = render_svg(workflow, catalog, background)?;

    let mut options = resvg::usvg::Options::default();
    options.font_family = "Inter".to_string();
    options.fontdb_mut().load_system_fonts();

    let tree = resvg::usvg::Tree::from_str(&svg, &options)
        .map_err(|err| anyhow!("failed to parse generated SVG for PNG export: {err}"))?;

    let size = tree.size().to_int_size();
    let scaled_width = ((size.width() as f32) * scale).ceil();
    let scaled_height = ((size.height() as f32) * scale).ceil();

    if !scaled_width.is_finite() || !scaled_height.is_finite() {
        bail!("scaled dimensions are not finite; try a smaller scale factor");
    }
    if scaled_width < 1.0 || scaled_height < 1.0 {
        bail!("scaled dimensions collapsed below 1px; try a larger scale factor");
    }
    if scaled_width > u32::MAX as f32 || scaled_height > u32::MAX as f32 {
        bail!("scaled dimensions exceed supported limits; try a smaller scale factor");
    }

    let scaled_width = scaled_width as u32;
    let scaled_height = scaled_height as u32;

    let mut pixmap = Pixmap::new(scaled_width, scaled_height).ok_or_else(|| {
        anyhow!("failed to allocate {scaled_width}x{scaled_height} surface for PNG export")
    })?;

    let transform = Transform::from_scale(scale, scale);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let png_data = pixmap
        .encode_png()
        .map_err(|err| anyhow!("failed to encode PNG output: {err}"))?;

    Ok(png_data)
}
