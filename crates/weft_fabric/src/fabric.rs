//! The top-level fabric value object.

use crate::error::FabricError;
use crate::layer::FabricLayer;
use crate::port::PortKey;
use std::collections::{BTreeMap, HashMap, HashSet};
use weft_common::{PortId, Resource, Side};

/// The routable view of a rectangular CGRA fabric.
///
/// Built once by the [`builder`](crate::builder) and immutable afterwards,
/// except for [`split_register`](Self::split_register) which runs between
/// placement and routing.
#[derive(Debug, Clone)]
pub struct Fabric {
    rows: u16,
    cols: u16,
    num_tracks: u16,
    pe_locations: HashSet<(u16, u16)>,
    mem_locations: HashSet<(u16, u16)>,
    /// Anchor row to bottom row of each memory tile.
    mem_spans: HashMap<(u16, u16), u16>,
    reg_slots: HashSet<(u16, u16, u16)>,
    layers: BTreeMap<u8, FabricLayer>,
    empty_locations: HashSet<(u16, u16)>,
}

impl Fabric {
    /// Assembles a fabric from pre-built parts. Normally done by the
    /// [`builder`](crate::builder).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rows: u16,
        cols: u16,
        num_tracks: u16,
        pe_locations: HashSet<(u16, u16)>,
        mem_locations: HashSet<(u16, u16)>,
        mem_spans: HashMap<(u16, u16), u16>,
        reg_slots: HashSet<(u16, u16, u16)>,
        layers: BTreeMap<u8, FabricLayer>,
    ) -> Self {
        Self {
            rows,
            cols,
            num_tracks,
            pe_locations,
            mem_locations,
            mem_spans,
            reg_slots,
            layers,
            empty_locations: HashSet::new(),
        }
    }

    /// Number of rows in the fabric.
    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Number of columns in the fabric.
    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Minimum track count across all tiles.
    pub fn num_tracks(&self) -> u16 {
        self.num_tracks
    }

    /// Locations a module of `resource` may be placed at.
    ///
    /// Register slots carry a track coordinate and are exposed separately
    /// through [`reg_slots`](Self::reg_slots); I/O locations through
    /// [`io_locations`](Self::io_locations).
    pub fn locations(&self, resource: Resource) -> &HashSet<(u16, u16)> {
        match resource {
            Resource::Pe => &self.pe_locations,
            Resource::Mem => &self.mem_locations,
            Resource::Reg | Resource::Io => &self.empty_locations,
        }
    }

    /// Switch-box register slots as `(x, y, track)` triples.
    pub fn reg_slots(&self) -> &HashSet<(u16, u16, u16)> {
        &self.reg_slots
    }

    /// The row span `(top, bottom)` of the memory tile anchored at `(x, y)`.
    pub fn mem_span(&self, x: u16, y: u16) -> Option<(u16, u16)> {
        self.mem_spans.get(&(x, y)).map(|&bottom| (y, bottom))
    }

    /// The edge ring where I/O modules may sit: every `x = 0` or `y = 0`
    /// location.
    pub fn io_locations(&self) -> HashSet<(u16, u16)> {
        let mut locations = HashSet::new();
        for y in 0..self.rows {
            locations.insert((0, y));
        }
        for x in 0..self.cols {
            locations.insert((x, 0));
        }
        locations
    }

    /// The routing layer for a bus width.
    pub fn layer(&self, width: u8) -> Option<&FabricLayer> {
        self.layers.get(&width)
    }

    /// Bus widths with a routing layer, ascending.
    pub fn widths(&self) -> impl Iterator<Item = u8> + '_ {
        self.layers.keys().copied()
    }

    /// Splits the register slot `(x, y, track, side)` on the given layer
    /// into a (sink, source) port pair. Idempotent per key.
    pub fn split_register(
        &mut self,
        width: u8,
        x: u16,
        y: u16,
        track: u16,
        side: Side,
    ) -> Result<(PortId, PortId), FabricError> {
        let layer = self
            .layers
            .get_mut(&width)
            .ok_or(FabricError::UnknownLayer(width))?;
        layer.split_port(&PortKey::Track { x, y, track, side })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fabric_2x2() -> Fabric {
        let pe = [(0, 0), (0, 1), (1, 0), (1, 1)].into_iter().collect();
        Fabric::new(
            2,
            2,
            2,
            pe,
            HashSet::new(),
            HashMap::new(),
            HashSet::new(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn io_ring() {
        let fabric = fabric_2x2();
        let io = fabric.io_locations();
        assert!(io.contains(&(0, 0)));
        assert!(io.contains(&(0, 1)));
        assert!(io.contains(&(1, 0)));
        assert!(!io.contains(&(1, 1)));
    }

    #[test]
    fn location_sets() {
        let fabric = fabric_2x2();
        assert_eq!(fabric.locations(Resource::Pe).len(), 4);
        assert!(fabric.locations(Resource::Mem).is_empty());
        assert!(fabric.locations(Resource::Reg).is_empty());
    }

    #[test]
    fn missing_layer_errors() {
        let mut fabric = fabric_2x2();
        assert!(matches!(
            fabric.split_register(16, 0, 0, 0, Side::N),
            Err(FabricError::UnknownLayer(16))
        ));
    }
}
