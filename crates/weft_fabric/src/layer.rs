//! A single bus-width routing layer: port/track arenas and their indexes.

use crate::error::FabricError;
use crate::port::{Port, PortDir, PortKey, PortRole, Track, TrackNote};
use std::collections::{BTreeSet, HashMap, HashSet};
use weft_common::{map_side, PortId, Resource, TrackId};

/// One bus-width layer of the fabric.
///
/// Ports and tracks live in arenas owned by the layer and are addressed by
/// [`PortId`]/[`TrackId`]. Three key maps partition the ports by routing
/// role:
///
/// - `sources` — ports a module drives signals from (PE/memory outputs,
///   register-output halves, fabric-edge inputs);
/// - `sinks` — ports at module inputs or fabric-edge outputs;
/// - `routable` — every other internal port, keyed so the register-split
///   pass can find switch-box track ports by `(x, y, track, side)`.
#[derive(Debug, Clone)]
pub struct FabricLayer {
    width: u8,
    ports: Vec<Port>,
    tracks: Vec<Track>,
    sources: HashMap<PortKey, PortId>,
    sinks: HashMap<PortKey, PortId>,
    routable: HashMap<PortKey, PortId>,
    port_names: HashMap<Resource, BTreeSet<String>>,
    notes: HashMap<TrackId, TrackNote>,
}

impl FabricLayer {
    /// Creates an empty layer for the given bus width.
    pub(crate) fn new(width: u8) -> Self {
        Self {
            width,
            ports: Vec::new(),
            tracks: Vec::new(),
            sources: HashMap::new(),
            sinks: HashMap::new(),
            routable: HashMap::new(),
            port_names: HashMap::new(),
            notes: HashMap::new(),
        }
    }

    /// Bus width of this layer in bits.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Returns the port with the given ID.
    pub fn port(&self, id: PortId) -> &Port {
        &self.ports[id.as_raw() as usize]
    }

    /// Returns the track with the given ID.
    pub fn track(&self, id: TrackId) -> &Track {
        &self.tracks[id.as_raw() as usize]
    }

    /// All tracks in creation order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Number of ports in the arena.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Number of tracks in the arena.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Looks up a module-driving port.
    pub fn source(&self, key: &PortKey) -> Option<PortId> {
        self.sources.get(key).copied()
    }

    /// Looks up a module-input or fabric-edge-output port.
    pub fn sink(&self, key: &PortKey) -> Option<PortId> {
        self.sinks.get(key).copied()
    }

    /// Looks up an internal routable port.
    pub fn routable(&self, key: &PortKey) -> Option<PortId> {
        self.routable.get(key).copied()
    }

    /// The full source map.
    pub fn sources(&self) -> &HashMap<PortKey, PortId> {
        &self.sources
    }

    /// The full sink map.
    pub fn sinks(&self) -> &HashMap<PortKey, PortId> {
        &self.sinks
    }

    /// The full routable-port map.
    pub fn routable_ports(&self) -> &HashMap<PortKey, PortId> {
        &self.routable
    }

    /// Connection-box port names collected for a resource kind.
    pub fn port_names(&self, resource: Resource) -> impl Iterator<Item = &str> {
        self.port_names
            .get(&resource)
            .into_iter()
            .flatten()
            .map(|s| s.as_str())
    }

    /// Bitstream annotation for a track, if one was recorded.
    pub fn note(&self, track: TrackId) -> Option<&TrackNote> {
        self.notes.get(&track)
    }

    pub(crate) fn new_port(&mut self, x: u16, y: u16, role: PortRole, dir: PortDir) -> PortId {
        let id = PortId::from_raw(self.ports.len() as u32);
        let name = Port::format_name(x, y, &role, dir);
        self.ports.push(Port {
            id,
            name,
            x,
            y,
            role,
            dir,
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        id
    }

    pub(crate) fn new_track(
        &mut self,
        src: PortId,
        dst: PortId,
        note: Option<TrackNote>,
    ) -> TrackId {
        let id = TrackId::from_raw(self.tracks.len() as u32);
        self.tracks.push(Track {
            id,
            src,
            dst,
            width: self.width,
        });
        self.ports[src.as_raw() as usize].outputs.push(id);
        self.ports[dst.as_raw() as usize].inputs.push(id);
        if let Some(note) = note {
            self.notes.insert(id, note);
        }
        id
    }

    pub(crate) fn add_source(&mut self, key: PortKey, port: PortId) {
        self.sources.insert(key, port);
    }

    pub(crate) fn add_sink(&mut self, key: PortKey, port: PortId) {
        self.sinks.insert(key, port);
    }

    pub(crate) fn add_port_name(&mut self, resource: Resource, name: &str) {
        self.port_names
            .entry(resource)
            .or_default()
            .insert(name.to_string());
    }

    /// Indexes every port that is neither a source nor a sink into the
    /// routable map. Called once at the end of construction.
    pub(crate) fn index_routable(&mut self) {
        let reserved: HashSet<PortId> = self
            .sources
            .values()
            .chain(self.sinks.values())
            .copied()
            .collect();
        for port in &self.ports {
            if reserved.contains(&port.id) {
                continue;
            }
            let key = match &port.role {
                PortRole::Track { side, track } => PortKey::Track {
                    x: port.x,
                    y: port.y,
                    track: *track,
                    side: *side,
                },
                PortRole::Named { name, .. } => PortKey::named(port.x, port.y, name.clone()),
            };
            self.routable.insert(key, port.id);
        }
    }

    /// Splits the switch-box track port at `key` into a register pair.
    ///
    /// The register-input half (`RegOut` port on the mapped neighbor side)
    /// takes over the original port's incoming tracks and is registered as a
    /// sink; the register-output half (`RegIn` port in place) takes over the
    /// outgoing tracks and is registered as a source. Splitting the same key
    /// twice returns the existing pair, so two registers sharing a slot at
    /// different pipeline colors resolve to the same physical ports.
    ///
    /// Returns `(sink, source)` port IDs.
    pub fn split_port(&mut self, key: &PortKey) -> Result<(PortId, PortId), FabricError> {
        if let (Some(sink), Some(source)) = (self.sink(key), self.source(key)) {
            return Ok((sink, source));
        }
        let PortKey::Track { x, y, track, side } = *key else {
            return Err(FabricError::UnknownPort(key.to_string()));
        };
        let original = self
            .routable
            .remove(key)
            .ok_or_else(|| FabricError::UnknownPort(key.to_string()))?;

        let outgoing = std::mem::take(&mut self.ports[original.as_raw() as usize].outputs);
        let incoming = std::mem::take(&mut self.ports[original.as_raw() as usize].inputs);

        let in_half = self.new_port(x, y, PortRole::Track { side, track }, PortDir::RegIn);
        for &t in &outgoing {
            self.tracks[t.as_raw() as usize].src = in_half;
        }
        self.ports[in_half.as_raw() as usize].outputs = outgoing;

        // An edge register keeps its own tile coordinates for the out half.
        let (ox, oy, oside) = map_side(x, y, side).unwrap_or((x, y, side));
        let out_half = self.new_port(
            ox,
            oy,
            PortRole::Track {
                side: oside,
                track,
            },
            PortDir::RegOut,
        );
        for &t in &incoming {
            self.tracks[t.as_raw() as usize].dst = out_half;
        }
        self.ports[out_half.as_raw() as usize].inputs = incoming;

        self.add_sink(key.clone(), out_half);
        self.add_source(key.clone(), in_half);
        Ok((out_half, in_half))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_common::Side;

    fn track_role(side: Side, track: u16) -> PortRole {
        PortRole::Track { side, track }
    }

    fn small_layer() -> FabricLayer {
        // a --t0--> p --t1--> b, where p is a routable SB port.
        let mut layer = FabricLayer::new(16);
        let a = layer.new_port(0, 0, track_role(Side::E, 0), PortDir::In);
        let p = layer.new_port(1, 0, track_role(Side::W, 0), PortDir::In);
        let b = layer.new_port(1, 0, track_role(Side::E, 0), PortDir::In);
        layer.new_track(a, p, None);
        layer.new_track(p, b, None);
        layer.add_source(PortKey::Edge { x: 0, y: 0, track: 0 }, a);
        layer.add_sink(PortKey::Edge { x: 1, y: 0, track: 0 }, b);
        layer.index_routable();
        layer
    }

    #[test]
    fn track_consistency() {
        let layer = small_layer();
        for track in layer.tracks() {
            assert!(layer.port(track.src).outputs.contains(&track.id));
            assert!(layer.port(track.dst).inputs.contains(&track.id));
        }
    }

    #[test]
    fn maps_are_disjoint() {
        let layer = small_layer();
        let sources: HashSet<_> = layer.sources().values().collect();
        let sinks: HashSet<_> = layer.sinks().values().collect();
        let routable: HashSet<_> = layer.routable_ports().values().collect();
        assert!(sources.is_disjoint(&sinks));
        assert!(sources.is_disjoint(&routable));
        assert!(sinks.is_disjoint(&routable));
    }

    #[test]
    fn split_rebinds_tracks() {
        let mut layer = small_layer();
        let key = PortKey::Track {
            x: 1,
            y: 0,
            track: 0,
            side: Side::W,
        };
        let (sink, source) = layer.split_port(&key).unwrap();
        assert_ne!(sink, source);

        // Incoming track now terminates at the sink half; outgoing track now
        // departs from the source half.
        let t0 = layer.track(TrackId::from_raw(0));
        let t1 = layer.track(TrackId::from_raw(1));
        assert_eq!(t0.dst, sink);
        assert_eq!(t1.src, source);

        assert_eq!(layer.sink(&key), Some(sink));
        assert_eq!(layer.source(&key), Some(source));
        assert!(layer.routable(&key).is_none());
    }

    #[test]
    fn split_is_idempotent() {
        let mut layer = small_layer();
        let key = PortKey::Track {
            x: 1,
            y: 0,
            track: 0,
            side: Side::W,
        };
        let first = layer.split_port(&key).unwrap();
        let second = layer.split_port(&key).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn split_missing_port_errors() {
        let mut layer = small_layer();
        let key = PortKey::Track {
            x: 5,
            y: 5,
            track: 0,
            side: Side::N,
        };
        assert!(matches!(
            layer.split_port(&key),
            Err(FabricError::UnknownPort(_))
        ));
    }
}
