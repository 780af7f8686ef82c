//! agentdeck command line and live console.
//!
//! The binary in `main.rs` only parses arguments and wires things up; the
//! pieces live here so they can be tested without a terminal.

pub mod cli;
pub mod commands;
pub mod console;
pub mod graph_canvas;
pub mod logging;
