//! Draws the render dataset on a ratatui braille canvas.

use deck_graph::{Bounds, GraphView, Position, Rgb};
use deck_protocol::NodeGroup;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols::Marker,
    text::Span,
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Block, Paragraph,
    },
    Frame,
};

/// Margin added around the node extent when fitting.
pub const FIT_PADDING: f64 = 60.0;
const LABEL_WIDTH: usize = 14;

/// The region of graph space shown on screen. Only replaced on a fit, so
/// small refreshes never move the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bounds: Bounds,
}

impl Viewport {
    pub fn fit(view: &GraphView) -> Option<Self> {
        view.bounds().map(|b| Self {
            bounds: b.padded(FIT_PADDING),
        })
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        [self.bounds.min_x, self.bounds.max_x]
    }

    /// Canvas y grows upward, graph y grows downward.
    pub fn y_bounds(&self) -> [f64; 2] {
        [-self.bounds.max_y, -self.bounds.min_y]
    }

    pub fn contains(&self, p: Position) -> bool {
        self.bounds.contains(p)
    }

    /// How many nodes currently fall inside the viewport.
    pub fn visible_count(&self, view: &GraphView) -> usize {
        view.nodes().filter(|n| self.contains(n.position)).count()
    }
}

pub fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn node_label(group: NodeGroup, glyph: char, label: &str) -> String {
    match group {
        NodeGroup::Admin | NodeGroup::Agent => {
            let short: String = label.chars().take(LABEL_WIDTH).collect();
            format!("{glyph} {short}")
        }
        _ => glyph.to_string(),
    }
}

pub fn render_graph(
    frame: &mut Frame,
    area: Rect,
    view: &GraphView,
    viewport: Option<&Viewport>,
    block: Block,
) {
    let Some(viewport) = viewport else {
        let waiting = Paragraph::new(Span::styled(
            "  Waiting for graph data...",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        frame.render_widget(waiting, area);
        return;
    };

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds(viewport.x_bounds())
        .y_bounds(viewport.y_bounds())
        .paint(|ctx| {
            for rendered in view.edges() {
                let (Some(from), Some(to)) = (
                    view.node(&rendered.edge.from),
                    view.node(&rendered.edge.to),
                ) else {
                    continue;
                };
                let color = if rendered.style.dashed {
                    Color::DarkGray
                } else {
                    to_color(rendered.style.color)
                };
                ctx.draw(&CanvasLine::new(
                    from.position.x,
                    -from.position.y,
                    to.position.x,
                    -to.position.y,
                    color,
                ));
            }
            // Nodes on their own layer so labels sit above the edges.
            ctx.layer();
            for rendered in view.nodes() {
                let label = node_label(
                    rendered.node.group,
                    rendered.style.shape.glyph(),
                    rendered.node.display_label(),
                );
                ctx.print(
                    rendered.position.x,
                    -rendered.position.y,
                    Span::styled(label, Style::default().fg(to_color(rendered.style.color))),
                );
            }
        });

    frame.render_widget(canvas, area);
}
