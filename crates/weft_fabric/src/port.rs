//! Ports, tracks, and the keys that index them.

use weft_common::{PortId, Resource, Side, TrackId};

/// Direction of a port relative to its tile.
///
/// `RegIn`/`RegOut` mark the two halves of a split pipeline-register port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDir {
    /// Signal enters the tile here.
    In,
    /// Signal leaves the tile here.
    Out,
    /// Register-input half of a split port.
    RegIn,
    /// Register-output half of a split port.
    RegOut,
}

impl PortDir {
    fn short(self) -> &'static str {
        match self {
            PortDir::In => "i",
            PortDir::Out => "o",
            PortDir::RegIn => "regi",
            PortDir::RegOut => "rego",
        }
    }
}

/// What a port is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortRole {
    /// A switch-box track endpoint on one side of a tile.
    Track {
        /// Tile side.
        side: Side,
        /// Track number on that side.
        track: u16,
    },
    /// A named port on a tile resource (PE input, PE output, memory wire).
    Named {
        /// The resource kind owning the port.
        resource: Resource,
        /// The port name (for example `a`, `pe_out_res`, `mem_out`).
        name: String,
    },
}

/// A routable endpoint in a fabric layer.
///
/// Ports carry the tracks that arrive at and depart from them; a [`Track`]
/// holds the two `PortId`s and the invariant is that every track appears in
/// its source port's `outputs` and its destination port's `inputs`.
#[derive(Debug, Clone)]
pub struct Port {
    /// The unique ID of this port within its layer.
    pub id: PortId,
    /// Display name, `(x, y)<side-or-resource>_<dir>[<track-or-name>]`.
    pub name: String,
    /// Column of the owning tile.
    pub x: u16,
    /// Row of the owning tile.
    pub y: u16,
    /// Side/track or resource/name attachment.
    pub role: PortRole,
    /// Direction relative to the tile.
    pub dir: PortDir,
    /// Tracks terminating at this port.
    pub inputs: Vec<TrackId>,
    /// Tracks departing from this port.
    pub outputs: Vec<TrackId>,
}

impl Port {
    /// Formats the canonical port name for the given attributes.
    pub fn format_name(x: u16, y: u16, role: &PortRole, dir: PortDir) -> String {
        match role {
            PortRole::Track { side, track } => {
                format!("({x}, {y}){side}_{}[{track}]", dir.short())
            }
            PortRole::Named { resource, name } => {
                format!("({x}, {y}){resource}_{}[{name}]", dir.short())
            }
        }
    }

    /// Returns the resource this port belongs to, if it is a named port.
    pub fn resource(&self) -> Option<Resource> {
        match &self.role {
            PortRole::Named { resource, .. } => Some(*resource),
            PortRole::Track { .. } => None,
        }
    }

    /// Returns the tile side, if this is a track port.
    pub fn side(&self) -> Option<Side> {
        match &self.role {
            PortRole::Track { side, .. } => Some(*side),
            PortRole::Named { .. } => None,
        }
    }
}

/// A directed routing resource between two ports.
#[derive(Debug, Clone)]
pub struct Track {
    /// The unique ID of this track within its layer.
    pub id: TrackId,
    /// Driving port.
    pub src: PortId,
    /// Receiving port.
    pub dst: PortId,
    /// Bus width in bits.
    pub width: u8,
}

/// Key into a layer's `sources`, `sinks`, or routable-port maps.
///
/// The heterogeneous shapes mirror how placement indexes the fabric: edge
/// I/O endpoints by `(x, y, track)`, resource ports by `(x, y, name)`, and
/// switch-box track ports (register slots included) by
/// `(x, y, track, side)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortKey {
    /// A fabric-edge track endpoint.
    Edge {
        /// Column.
        x: u16,
        /// Row.
        y: u16,
        /// Track number.
        track: u16,
    },
    /// A named resource port.
    Named {
        /// Column.
        x: u16,
        /// Row.
        y: u16,
        /// Port name.
        name: String,
    },
    /// A switch-box track port.
    Track {
        /// Column.
        x: u16,
        /// Row.
        y: u16,
        /// Track number.
        track: u16,
        /// Tile side.
        side: Side,
    },
}

impl PortKey {
    /// Convenience constructor for named keys.
    pub fn named(x: u16, y: u16, name: impl Into<String>) -> Self {
        PortKey::Named {
            x,
            y,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for PortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortKey::Edge { x, y, track } => write!(f, "({x}, {y})[{track}]"),
            PortKey::Named { x, y, name } => write!(f, "({x}, {y})[{name}]"),
            PortKey::Track { x, y, track, side } => write!(f, "({x}, {y}){side}[{track}]"),
        }
    }
}

/// Which fabric structure a track is configured through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackParent {
    /// Connection-box mux.
    Cb,
    /// Switch-box mux or feedthrough.
    Sb,
}

impl std::fmt::Display for TrackParent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackParent::Cb => write!(f, "CB"),
            TrackParent::Sb => write!(f, "SB"),
        }
    }
}

/// Bitstream annotation for a track: the XML wire-name pair it was built
/// from and the structure that configures it.
#[derive(Debug, Clone)]
pub struct TrackNote {
    /// `(source wire name, sink wire name)` as written in the fabric XML.
    pub wires: (String, String),
    /// Configuring structure.
    pub parent: TrackParent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_port_name() {
        let role = PortRole::Track {
            side: Side::N,
            track: 2,
        };
        assert_eq!(Port::format_name(1, 3, &role, PortDir::In), "(1, 3)N_i[2]");
    }

    #[test]
    fn named_port_name() {
        let role = PortRole::Named {
            resource: Resource::Pe,
            name: "pe_out_res".into(),
        };
        assert_eq!(
            Port::format_name(0, 0, &role, PortDir::Out),
            "(0, 0)PE_o[pe_out_res]"
        );
    }

    #[test]
    fn split_port_names() {
        let role = PortRole::Track {
            side: Side::E,
            track: 0,
        };
        assert_eq!(
            Port::format_name(2, 1, &role, PortDir::RegIn),
            "(2, 1)E_regi[0]"
        );
        assert_eq!(
            Port::format_name(2, 1, &role, PortDir::RegOut),
            "(2, 1)E_rego[0]"
        );
    }

    #[test]
    fn key_display() {
        let key = PortKey::Track {
            x: 1,
            y: 2,
            track: 0,
            side: Side::S,
        };
        assert_eq!(format!("{key}"), "(1, 2)S[0]");
    }
}
