//! Fabric geometry primitives: tile sides, resource kinds, and the fixed
//! side-mapping table between adjacent tiles.

use serde::{Deserialize, Serialize};

/// One of the four sides of a tile.
///
/// Row 0 is the northern edge of the fabric, so `N` points toward smaller
/// row indices and `S` toward larger ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    /// Toward row `y - 1`.
    N,
    /// Toward row `y + 1`.
    S,
    /// Toward column `x + 1`.
    E,
    /// Toward column `x - 1`.
    W,
}

impl Side {
    /// All four sides, in the order used for port generation.
    pub const ALL: [Side; 4] = [Side::N, Side::S, Side::E, Side::W];

    /// Returns the side facing this one on the adjacent tile.
    pub fn opposite(self) -> Side {
        match self {
            Side::N => Side::S,
            Side::S => Side::N,
            Side::E => Side::W,
            Side::W => Side::E,
        }
    }

    /// A stable small-integer encoding, used for solver variables.
    pub fn index(self) -> u16 {
        match self {
            Side::N => 0,
            Side::S => 1,
            Side::E => 2,
            Side::W => 3,
        }
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(index: u16) -> Option<Side> {
        match index {
            0 => Some(Side::N),
            1 => Some(Side::S),
            2 => Some(Side::E),
            3 => Some(Side::W),
            _ => None,
        }
    }

    /// Parses the single-letter side name used in wire names.
    pub fn from_letter(letter: &str) -> Option<Side> {
        match letter {
            "N" => Some(Side::N),
            "S" => Some(Side::S),
            "E" => Some(Side::E),
            "W" => Some(Side::W),
            _ => None,
        }
    }

    /// The single-letter name used in wire names and port names.
    pub fn letter(self) -> &'static str {
        match self {
            Side::N => "N",
            Side::S => "S",
            Side::E => "E",
            Side::W => "W",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// The physical resource kind a design module occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    /// A processing element tile.
    #[serde(rename = "PE")]
    Pe,
    /// A memory tile (spans multiple rows).
    #[serde(rename = "Mem")]
    Mem,
    /// A pipeline register at a switch-box mux.
    #[serde(rename = "Reg")]
    Reg,
    /// A fabric-edge I/O endpoint.
    #[serde(rename = "IO")]
    Io,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Pe => write!(f, "PE"),
            Resource::Mem => write!(f, "Mem"),
            Resource::Reg => write!(f, "Reg"),
            Resource::Io => write!(f, "IO"),
        }
    }
}

/// Maps a tile side to the receiving tile location and side.
///
/// Returns `None` when the neighbor would fall off the north or west edge;
/// east/south overruns are left to the caller's bounds checks, matching how
/// the builder probes its port maps.
pub fn map_side(x: u16, y: u16, side: Side) -> Option<(u16, u16, Side)> {
    match side {
        Side::N => y.checked_sub(1).map(|ny| (x, ny, Side::S)),
        Side::S => Some((x, y + 1, Side::N)),
        Side::E => Some((x + 1, y, Side::W)),
        Side::W => x.checked_sub(1).map(|nx| (nx, y, Side::E)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_sides() {
        assert_eq!(Side::N.opposite(), Side::S);
        assert_eq!(Side::S.opposite(), Side::N);
        assert_eq!(Side::E.opposite(), Side::W);
        assert_eq!(Side::W.opposite(), Side::E);
    }

    #[test]
    fn side_index_roundtrip() {
        for side in Side::ALL {
            assert_eq!(Side::from_index(side.index()), Some(side));
        }
        assert_eq!(Side::from_index(4), None);
    }

    #[test]
    fn map_side_interior() {
        assert_eq!(map_side(1, 1, Side::N), Some((1, 0, Side::S)));
        assert_eq!(map_side(1, 1, Side::S), Some((1, 2, Side::N)));
        assert_eq!(map_side(1, 1, Side::E), Some((2, 1, Side::W)));
        assert_eq!(map_side(1, 1, Side::W), Some((0, 1, Side::E)));
    }

    #[test]
    fn map_side_off_edge() {
        assert_eq!(map_side(0, 0, Side::N), None);
        assert_eq!(map_side(0, 0, Side::W), None);
        // East/south overruns are representable; bounds are the caller's job.
        assert_eq!(map_side(0, 0, Side::E), Some((1, 0, Side::W)));
    }

    #[test]
    fn resource_serde_names() {
        assert_eq!(serde_json::to_string(&Resource::Pe).unwrap(), "\"PE\"");
        assert_eq!(serde_json::to_string(&Resource::Io).unwrap(), "\"IO\"");
        let r: Resource = serde_json::from_str("\"Mem\"").unwrap();
        assert_eq!(r, Resource::Mem);
    }
}
