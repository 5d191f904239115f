//! Wire-name grammar for switch-box and memory-tile wires.
//!
//! Switch-box wires follow `<in|out>_BUS<w>_<side>_<track>` (for example
//! `in_BUS16_S_0`). Memory-tile track wires follow
//! `<in|out>_<side>_BUS<w>_<track>` (for example `in_W_BUS16_2`). Memory
//! tiles additionally use distinguished named wires (`valid`, `almost_full`,
//! `mem_out`, ...) which do not parse under either grammar and are resolved
//! by name.

use crate::geom::Side;

/// Direction of a wire relative to its tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireDir {
    /// An input wire (`in_` prefix).
    In,
    /// An output wire (`out_` prefix).
    Out,
}

/// A parsed track wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireName {
    /// Input or output relative to the tile.
    pub dir: WireDir,
    /// Bus width in bits.
    pub bus: u8,
    /// Tile side the wire enters or leaves through.
    pub side: Side,
    /// Track number on that side.
    pub track: u16,
}

/// Error raised when a wire name does not follow the expected grammar.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("malformed wire name '{name}': {reason}")]
pub struct WireNameError {
    /// The offending wire name.
    pub name: String,
    /// What failed to parse.
    pub reason: &'static str,
}

impl WireNameError {
    fn new(name: &str, reason: &'static str) -> Self {
        Self {
            name: name.to_string(),
            reason,
        }
    }
}

fn parse_dir(token: &str, name: &str) -> Result<WireDir, WireNameError> {
    match token {
        "in" => Ok(WireDir::In),
        "out" => Ok(WireDir::Out),
        _ => Err(WireNameError::new(name, "expected 'in' or 'out' prefix")),
    }
}

fn parse_bus(token: &str, name: &str) -> Result<u8, WireNameError> {
    let digits = token
        .strip_prefix("BUS")
        .ok_or_else(|| WireNameError::new(name, "expected 'BUS<w>' segment"))?;
    digits
        .parse()
        .map_err(|_| WireNameError::new(name, "bus width is not a number"))
}

fn parse_side(token: &str, name: &str) -> Result<Side, WireNameError> {
    Side::from_letter(token).ok_or_else(|| WireNameError::new(name, "unknown side letter"))
}

fn parse_track(token: &str, name: &str) -> Result<u16, WireNameError> {
    token
        .parse()
        .map_err(|_| WireNameError::new(name, "track is not a number"))
}

/// Parses a switch-box wire name: `<in|out>_BUS<w>_<side>_<track>`.
pub fn parse_sb_wire(name: &str) -> Result<WireName, WireNameError> {
    let mut parts = name.split('_');
    let dir = parse_dir(
        parts
            .next()
            .ok_or_else(|| WireNameError::new(name, "empty name"))?,
        name,
    )?;
    let bus = parse_bus(
        parts
            .next()
            .ok_or_else(|| WireNameError::new(name, "missing bus segment"))?,
        name,
    )?;
    let side = parse_side(
        parts
            .next()
            .ok_or_else(|| WireNameError::new(name, "missing side segment"))?,
        name,
    )?;
    let track = parse_track(
        parts
            .next()
            .ok_or_else(|| WireNameError::new(name, "missing track segment"))?,
        name,
    )?;
    if parts.next().is_some() {
        return Err(WireNameError::new(name, "trailing segments"));
    }
    Ok(WireName {
        dir,
        bus,
        side,
        track,
    })
}

/// Parses a memory-tile track wire name: `<in|out>_<side>_BUS<w>_<track>`.
pub fn parse_mem_wire(name: &str) -> Result<WireName, WireNameError> {
    let mut parts = name.split('_');
    let dir = parse_dir(
        parts
            .next()
            .ok_or_else(|| WireNameError::new(name, "empty name"))?,
        name,
    )?;
    let side = parse_side(
        parts
            .next()
            .ok_or_else(|| WireNameError::new(name, "missing side segment"))?,
        name,
    )?;
    let bus = parse_bus(
        parts
            .next()
            .ok_or_else(|| WireNameError::new(name, "missing bus segment"))?,
        name,
    )?;
    let track = parse_track(
        parts
            .next()
            .ok_or_else(|| WireNameError::new(name, "missing track segment"))?,
        name,
    )?;
    if parts.next().is_some() {
        return Err(WireNameError::new(name, "trailing segments"));
    }
    Ok(WireName {
        dir,
        bus,
        side,
        track,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sb_wire_in() {
        let w = parse_sb_wire("in_BUS16_S_0").unwrap();
        assert_eq!(
            w,
            WireName {
                dir: WireDir::In,
                bus: 16,
                side: Side::S,
                track: 0
            }
        );
    }

    #[test]
    fn sb_wire_out() {
        let w = parse_sb_wire("out_BUS1_W_3").unwrap();
        assert_eq!(w.dir, WireDir::Out);
        assert_eq!(w.bus, 1);
        assert_eq!(w.side, Side::W);
        assert_eq!(w.track, 3);
    }

    #[test]
    fn mem_wire() {
        let w = parse_mem_wire("in_W_BUS16_2").unwrap();
        assert_eq!(
            w,
            WireName {
                dir: WireDir::In,
                bus: 16,
                side: Side::W,
                track: 2
            }
        );
    }

    #[test]
    fn mem_wire_out() {
        let w = parse_mem_wire("out_E_BUS16_0").unwrap();
        assert_eq!(w.dir, WireDir::Out);
        assert_eq!(w.side, Side::E);
    }

    #[test]
    fn rejects_named_memory_wires() {
        assert!(parse_sb_wire("valid").is_err());
        assert!(parse_mem_wire("mem_out").is_err());
        assert!(parse_mem_wire("almost_full").is_err());
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse_sb_wire("in_BUS16_S").is_err());
        assert!(parse_sb_wire("in_BUSx_S_0").is_err());
        assert!(parse_sb_wire("sideways_BUS16_S_0").is_err());
        assert!(parse_sb_wire("in_BUS16_Q_0").is_err());
        assert!(parse_sb_wire("in_BUS16_S_0_7").is_err());
    }
}
