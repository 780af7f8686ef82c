//! agentdeck graph pipeline
//!
//! Snapshot → diff → layout for new nodes → render dataset. The
//! [`GraphView`] holds the only long-lived state: the currently rendered
//! nodes and edges, keyed by id.

pub mod dataset;
pub mod diff;
pub mod layout;
pub mod style;

pub use dataset::{ApplyOutcome, Bounds, ChangeSet, GraphView, RenderedEdge, RenderedNode, FIT_VIEW_ADD_THRESHOLD};
pub use diff::{diff_collection, Diff, Keyed};
pub use layout::{LayoutAssigner, LayoutConfig, LayoutContext, Placement, Position};
pub use style::{EdgeStyle, NodeShape, NodeStyle, Rgb};
