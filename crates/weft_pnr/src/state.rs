//! Bidirectional placement and routing state stores.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use weft_common::{ModuleId, PortId, Side, TrackId};
use weft_design::Design;

/// Where a module sits on the fabric.
///
/// `Reg` placements gain their `side` after the register-side pass; the
/// solver assigns only `(x, y, track)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// A tile-granular placement (PE, memory, I/O).
    Tile {
        /// Column.
        x: u16,
        /// Row.
        y: u16,
    },
    /// A switch-box register slot.
    Reg {
        /// Column.
        x: u16,
        /// Row.
        y: u16,
        /// Track number.
        track: u16,
        /// In-port side, assigned after placement from the driven module's
        /// position.
        side: Option<Side>,
    },
}

impl Placement {
    /// The tile coordinates of this placement.
    pub fn xy(&self) -> (u16, u16) {
        match *self {
            Placement::Tile { x, y } => (x, y),
            Placement::Reg { x, y, .. } => (x, y),
        }
    }
}

/// Injective module-to-location mapping with a reverse occupancy index.
#[derive(Debug, Clone, Default)]
pub struct PlacementState {
    by_module: HashMap<ModuleId, Placement>,
    occupied: HashMap<(u16, u16), HashSet<ModuleId>>,
}

impl PlacementState {
    /// Creates an empty placement state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records (or overwrites) a module's placement, keeping the reverse
    /// index consistent.
    pub fn insert(&mut self, module: ModuleId, placement: Placement) {
        self.remove(module);
        self.occupied
            .entry(placement.xy())
            .or_default()
            .insert(module);
        self.by_module.insert(module, placement);
    }

    /// Deletes a module's placement, if any.
    pub fn remove(&mut self, module: ModuleId) -> Option<Placement> {
        let placement = self.by_module.remove(&module)?;
        if let Some(set) = self.occupied.get_mut(&placement.xy()) {
            set.remove(&module);
            if set.is_empty() {
                self.occupied.remove(&placement.xy());
            }
        }
        Some(placement)
    }

    /// The placement of a module.
    pub fn get(&self, module: ModuleId) -> Option<&Placement> {
        self.by_module.get(&module)
    }

    /// Whether the module has a placement.
    pub fn contains(&self, module: ModuleId) -> bool {
        self.by_module.contains_key(&module)
    }

    /// The occupancy set `I`: every `(x, y)` with at least one module.
    pub fn occupied(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.occupied.keys().copied()
    }

    /// Whether any module occupies `(x, y)`.
    pub fn is_occupied(&self, x: u16, y: u16) -> bool {
        self.occupied.contains_key(&(x, y))
    }

    /// Modules occupying `(x, y)`.
    pub fn modules_at(&self, x: u16, y: u16) -> impl Iterator<Item = ModuleId> + '_ {
        self.occupied
            .get(&(x, y))
            .into_iter()
            .flatten()
            .copied()
    }

    /// All `(module, placement)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &Placement)> {
        self.by_module.iter().map(|(&m, p)| (m, p))
    }

    /// Number of placed modules.
    pub fn len(&self) -> usize {
        self.by_module.len()
    }

    /// Whether no module is placed.
    pub fn is_empty(&self) -> bool {
        self.by_module.is_empty()
    }

    /// Converts to name-keyed records for serialization.
    pub fn to_records(&self, design: &Design) -> Vec<PlacementRecord> {
        let mut records: Vec<PlacementRecord> = self
            .by_module
            .iter()
            .map(|(&module, &placement)| PlacementRecord {
                module: design.module(module).name.clone(),
                placement,
            })
            .collect();
        records.sort_by(|a, b| a.module.cmp(&b.module));
        records
    }
}

/// A serializable `(module name, placement)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementRecord {
    /// Module name.
    pub module: String,
    /// Its placement.
    pub placement: Placement,
}

/// One configured track along a routed net.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    /// The track carrying the signal.
    pub track: TrackId,
    /// The track's source port.
    pub src: PortId,
    /// The track's destination port.
    pub dst: PortId,
    /// Bus width of the routing layer.
    pub width: u8,
}

/// The routing solution for one physical net.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedNet {
    /// Track records forming a simple path from source to sink.
    pub steps: Vec<RouteStep>,
    /// Graph node names along the path, for debug printing.
    pub trace: Vec<String>,
}

/// Write-once routing state, keyed by virtual-net index.
#[derive(Debug, Clone, Default)]
pub struct RoutingState {
    by_net: BTreeMap<usize, RoutedNet>,
}

impl RoutingState {
    /// Creates an empty routing state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the routing of a net.
    pub fn insert(&mut self, net: usize, routed: RoutedNet) {
        self.by_net.insert(net, routed);
    }

    /// The routing of a net.
    pub fn get(&self, net: usize) -> Option<&RoutedNet> {
        self.by_net.get(&net)
    }

    /// All routed nets in net-index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &RoutedNet)> {
        self.by_net.iter().map(|(&n, r)| (n, r))
    }

    /// Number of routed nets.
    pub fn len(&self) -> usize {
        self.by_net.len()
    }

    /// Whether no net is routed.
    pub fn is_empty(&self) -> bool {
        self.by_net.is_empty()
    }
}
