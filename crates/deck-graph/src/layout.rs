//! Initial placement of newly added nodes.
//!
//! Policy: the admin root sits pinned at the origin with its context
//! entries on a fixed "crown" circle around it. Agents sit on a ring
//! beyond the crown, spread by the golden angle, and each agent's tasks
//! and files form two rings around that agent. Anything else is scattered
//! outside the crown. A node is placed once, when it first appears.

use std::collections::HashMap;
use std::f64::consts::{PI, TAU};

use deck_protocol::{GraphNode, GraphSnapshot, NodeGroup, ADMIN_ROOT_ID};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Golden angle in radians (~137.5°).
pub const GOLDEN_ANGLE: f64 = PI * (3.0 - 2.236_067_977_499_79);

/// Two positions closer than this count as the same slot.
pub const SLOT_EPSILON: f64 = 1.0;
/// Agent slots tried past the preferred index before giving up.
const MAX_AGENT_ATTEMPTS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Radius of the fixed circle of admin-attached context entries.
    pub crown_radius: f64,
    /// Radius of the agent ring. Clamped to stay outside the crown.
    pub agent_ring_radius: f64,
    pub task_ring_radius: f64,
    pub file_ring_radius: f64,
    /// Gap between the crown and the scatter annulus.
    pub exclusion_margin: f64,
    /// Width of the annulus unassigned nodes are scattered into.
    pub scatter_width: f64,
    pub task_angle_offset_deg: f64,
    pub file_angle_offset_deg: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            crown_radius: 220.0,
            agent_ring_radius: 520.0,
            task_ring_radius: 160.0,
            file_ring_radius: 90.0,
            exclusion_margin: 60.0,
            scatter_width: 400.0,
            task_angle_offset_deg: 15.0,
            file_angle_offset_deg: 45.0,
        }
    }
}

impl LayoutConfig {
    fn agent_radius(&self) -> f64 {
        self.agent_ring_radius
            .max(self.crown_radius + self.exclusion_margin)
    }

    fn scatter_inner(&self) -> f64 {
        self.crown_radius + self.exclusion_margin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn polar(center: Position, radius: f64, angle: f64) -> Self {
        Self {
            x: center.x + radius * angle.cos(),
            y: center.y + radius * angle.sin(),
        }
    }

    pub fn distance_to(&self, other: Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Angle from the origin in degrees, normalised to [0, 360).
    pub fn angle_deg(&self) -> f64 {
        self.y.atan2(self.x).to_degrees().rem_euclid(360.0)
    }
}

/// Where a node starts and whether the simulation may move it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Position,
    pub fixed: bool,
}

/// Per-snapshot facts the assigner needs: crown membership, agent order,
/// and which agent owns each task/file.
#[derive(Debug, Default)]
pub struct LayoutContext {
    crown: HashMap<String, (usize, usize)>,
    agent_index: HashMap<String, usize>,
    owner: HashMap<String, String>,
    siblings: HashMap<String, (usize, usize)>,
}

impl LayoutContext {
    pub fn build(snapshot: &GraphSnapshot) -> Self {
        let admins: Vec<&str> = snapshot
            .nodes
            .iter()
            .filter(|n| n.group == NodeGroup::Admin)
            .map(|n| n.id.as_str())
            .collect();
        let is_admin = |id: &str| id == ADMIN_ROOT_ID || admins.iter().any(|a| *a == id);

        let crown_ids: Vec<&str> = snapshot
            .nodes
            .iter()
            .filter(|n| n.group == NodeGroup::Context)
            .filter(|n| {
                n.attached_to().map(is_admin).unwrap_or(false)
                    || snapshot
                        .edges
                        .iter()
                        .filter_map(|e| e.other_end(&n.id))
                        .any(is_admin)
            })
            .map(|n| n.id.as_str())
            .collect();
        let crown = crown_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), (i, crown_ids.len())))
            .collect();

        let agents: Vec<&GraphNode> = snapshot
            .nodes
            .iter()
            .filter(|n| n.group == NodeGroup::Agent)
            .collect();
        let agent_index = agents
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect::<HashMap<_, _>>();

        // Owner strings in payloads name agents loosely: node id, label,
        // the raw agent id, or the id without its `agent_` prefix.
        let mut alias: HashMap<&str, &str> = HashMap::new();
        for agent in &agents {
            alias.insert(agent.id.as_str(), agent.id.as_str());
            alias.entry(agent.label.as_str()).or_insert(agent.id.as_str());
            if let Some(raw) = agent.attr_str("agent_id") {
                alias.entry(raw).or_insert(agent.id.as_str());
            }
            if let Some(stripped) = agent.id.strip_prefix("agent_") {
                alias.entry(stripped).or_insert(agent.id.as_str());
            }
        }

        let mut owner = HashMap::new();
        for node in snapshot
            .nodes
            .iter()
            .filter(|n| matches!(n.group, NodeGroup::Task | NodeGroup::File))
        {
            let explicit = node.owner().and_then(|o| alias.get(o).copied());
            let via_edge = || {
                snapshot
                    .edges
                    .iter()
                    .filter_map(|e| e.other_end(&node.id))
                    .find(|other| agent_index.contains_key(*other))
            };
            if let Some(agent_id) = explicit.or_else(via_edge) {
                owner.insert(node.id.clone(), agent_id.to_string());
            }
        }

        let mut groups: HashMap<(&str, NodeGroup), Vec<&str>> = HashMap::new();
        for node in &snapshot.nodes {
            if let Some(agent_id) = owner.get(&node.id) {
                groups
                    .entry((agent_id.as_str(), node.group))
                    .or_default()
                    .push(node.id.as_str());
            }
        }
        let mut siblings = HashMap::new();
        for members in groups.values() {
            for (i, id) in members.iter().enumerate() {
                siblings.insert(id.to_string(), (i, members.len()));
            }
        }

        Self {
            crown,
            agent_index,
            owner,
            siblings,
        }
    }

    pub fn is_crown(&self, id: &str) -> bool {
        self.crown.contains_key(id)
    }

    pub fn owner_of(&self, id: &str) -> Option<&str> {
        self.owner.get(id).map(String::as_str)
    }

    pub fn agent_index(&self, id: &str) -> Option<usize> {
        self.agent_index.get(id).copied()
    }
}

/// Assigns starting coordinates. Randomness only affects scattered nodes.
pub struct LayoutAssigner {
    config: LayoutConfig,
    rng: StdRng,
}

impl LayoutAssigner {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(config: LayoutConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Place `node`. `anchor` returns the current position of an already
    /// rendered node; task and file rings centre on their agent's anchor.
    /// `occupied` reports whether a rendered node already sits on a
    /// position. Ring slots that are taken are skipped, so nodes added by a
    /// later snapshot never stack on earlier ones.
    pub fn place(
        &mut self,
        node: &GraphNode,
        ctx: &LayoutContext,
        anchor: &dyn Fn(&str) -> Option<Position>,
        occupied: &dyn Fn(Position) -> bool,
    ) -> Placement {
        let cfg = self.config;
        match node.group {
            NodeGroup::Admin => Placement {
                position: Position::ORIGIN,
                fixed: true,
            },
            NodeGroup::Context if ctx.is_crown(&node.id) => {
                let (i, n) = ctx.crown[&node.id];
                Placement {
                    position: free_ring_slot(Position::ORIGIN, cfg.crown_radius, i, n, 0.0, occupied),
                    fixed: true,
                }
            }
            NodeGroup::Agent => {
                let i = ctx.agent_index(&node.id).unwrap_or(0);
                Placement {
                    position: self.free_agent_slot(i, occupied),
                    fixed: false,
                }
            }
            NodeGroup::Task | NodeGroup::File => match ctx.owner_of(&node.id) {
                Some(agent_id) => {
                    let center = anchor(agent_id).unwrap_or_else(|| {
                        self.agent_slot(ctx.agent_index(agent_id).unwrap_or(0))
                    });
                    let (i, n) = ctx.siblings.get(&node.id).copied().unwrap_or((0, 1));
                    let (radius, offset) = if node.group == NodeGroup::Task {
                        (cfg.task_ring_radius, cfg.task_angle_offset_deg)
                    } else {
                        (cfg.file_ring_radius, cfg.file_angle_offset_deg)
                    };
                    Placement {
                        position: free_ring_slot(center, radius, i, n, offset, occupied),
                        fixed: false,
                    }
                }
                None => self.scatter(),
            },
            _ => self.scatter(),
        }
    }

    fn agent_slot(&self, index: usize) -> Position {
        Position::polar(
            Position::ORIGIN,
            self.config.agent_radius(),
            index as f64 * GOLDEN_ANGLE,
        )
    }

    /// First unoccupied golden-angle slot at or after `index`.
    fn free_agent_slot(&self, index: usize, occupied: &dyn Fn(Position) -> bool) -> Position {
        (index..index + MAX_AGENT_ATTEMPTS)
            .map(|k| self.agent_slot(k))
            .find(|p| !occupied(*p))
            .unwrap_or_else(|| self.agent_slot(index))
    }

    fn scatter(&mut self) -> Placement {
        let inner = self.config.scatter_inner();
        let radius = inner + self.rng.gen::<f64>() * self.config.scatter_width.max(0.0);
        let angle = self.rng.gen_range(0.0..TAU);
        Placement {
            position: Position::polar(Position::ORIGIN, radius, angle),
            fixed: false,
        }
    }
}

/// Slot `i` of `n` on a ring, or the next free one going round. When all
/// `n` slots are taken the ring is subdivided, halving the spacing.
fn free_ring_slot(
    center: Position,
    radius: f64,
    i: usize,
    n: usize,
    offset_deg: f64,
    occupied: &dyn Fn(Position) -> bool,
) -> Position {
    let n = n.max(1);
    let mut slots = n;
    for _ in 0..4 {
        let start = i * slots / n;
        for k in 0..slots {
            let p = Position::polar(center, radius, even_angle((start + k) % slots, slots, offset_deg));
            if !occupied(p) {
                return p;
            }
        }
        slots *= 2;
    }
    Position::polar(center, radius, even_angle(i, n, offset_deg))
}

/// Angle of slot `i` of `n` evenly spaced slots, rotated by `offset_deg`.
fn even_angle(i: usize, n: usize, offset_deg: f64) -> f64 {
    let n = n.max(1) as f64;
    (offset_deg + 360.0 * i as f64 / n).to_radians()
}
