//! agentdeck protocol - payload types for the orchestration control plane
//!
//! Everything the backend sends is decoded here through an explicit,
//! fallible boundary before any other crate touches it.

pub mod constants;
pub mod decode;
pub mod edge;
pub mod error;
pub mod stats;
pub mod types;

pub use constants::*;
pub use decode::{decode_list, decode_snapshot, parse_string_list, SnapshotDecode};
pub use edge::EdgeKind;
pub use error::*;
pub use stats::DashboardStats;
pub use types::*;
