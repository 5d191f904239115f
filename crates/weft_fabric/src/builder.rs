//! Fabric XML parser and port/track graph builder.
//!
//! Construction runs in phases over the `<tile>` elements:
//!
//! 1. **Pre-scan** — fabric extents, per-tile track counts, tile
//!    classification (PE vs memory), and register-slot discovery.
//! 2. **Layer generation** (per bus width) — switch-box input ports for
//!    every PE tile side, memory-tile side ports, fabric-edge inputs
//!    registered as sources.
//! 3. **Tile connection** — each side's output port collection aliases the
//!    neighbor's input collection, so adjacent tiles share port nodes;
//!    off-edge sides get fresh output ports registered as sinks.
//! 4-7. **Wiring** — connection-box muxes (PE then memory), memory-tile
//!    internal switch wires (with lazily allocated named ports), switch-box
//!    muxes and feedthroughs. Every track records its XML wire-name pair for
//!    the bitstream writer.

use crate::error::FabricError;
use crate::fabric::Fabric;
use crate::layer::FabricLayer;
use crate::port::{PortDir, PortKey, PortRole, TrackNote, TrackParent};
use roxmltree::Node;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use weft_common::{
    map_side, parse_mem_wire, parse_sb_wire, PortId, Resource, Side, WireDir, WireName,
};

/// Memory wires that may drive the routing fabric directly.
const MEM_SOURCE_WIRES: [&str; 3] = ["valid", "almost_full", "mem_out"];

/// Loads and parses a fabric XML file.
pub fn load_fabric(path: &Path) -> Result<Fabric, FabricError> {
    let text = std::fs::read_to_string(path)?;
    parse_fabric(&text)
}

/// Parses a fabric from XML text.
pub fn parse_fabric(text: &str) -> Result<Fabric, FabricError> {
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();

    let scan = pre_scan(root)?;

    let mut layers = BTreeMap::new();
    for &width in &scan.bus_widths {
        let mut builder = LayerBuilder::new(&scan, width);
        builder.generate_layer();
        builder.connect_tiles();
        builder.connect_pe(root)?;
        builder.connect_mem_cb(root)?;
        builder.connect_mem_internal(root)?;
        builder.connect_sb(root)?;
        layers.insert(width, builder.finish());
    }

    let num_tracks = scan.num_tracks.values().copied().min().unwrap_or(0);
    log::info!(
        "fabric: {}x{} tiles, {} PE / {} memory locations, {} layers",
        scan.cols,
        scan.rows,
        scan.pe_locations.len(),
        scan.mem_locations.len(),
        layers.len()
    );

    let mem_spans = scan
        .mem_bounds
        .iter()
        .map(|&(x, top, bottom)| ((x, top), bottom))
        .collect();

    Ok(Fabric::new(
        scan.rows,
        scan.cols,
        num_tracks,
        scan.pe_locations,
        scan.mem_locations,
        mem_spans,
        scan.reg_slots,
        layers,
    ))
}

/// Everything the per-layer passes need from the first walk over the tiles.
struct PreScan {
    rows: u16,
    cols: u16,
    num_tracks: HashMap<(u16, u16, u8), u16>,
    bus_widths: BTreeSet<u8>,
    pe_locations: HashSet<(u16, u16)>,
    mem_locations: HashSet<(u16, u16)>,
    /// `(x, top row, bottom row)` extents of each memory tile.
    mem_bounds: HashSet<(u16, u16, u16)>,
    reg_slots: HashSet<(u16, u16, u16)>,
}

fn elements<'a, 'i>(
    node: Node<'a, 'i>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children().filter(move |n| n.has_tag_name(tag))
}

fn attr_u16(node: Node, name: &str) -> Result<u16, FabricError> {
    let value = node
        .attribute(name)
        .ok_or_else(|| FabricError::malformed(format!("<{}> missing '{name}' attribute", node.tag_name().name())))?;
    value
        .parse()
        .map_err(|_| FabricError::malformed(format!("'{name}' attribute '{value}' is not a number")))
}

fn attr<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, FabricError> {
    node.attribute(name).ok_or_else(|| {
        FabricError::malformed(format!("<{}> missing '{name}' attribute", node.tag_name().name()))
    })
}

fn bus_width(token: &str) -> Result<u8, FabricError> {
    token
        .strip_prefix("BUS")
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| FabricError::malformed(format!("malformed bus token '{token}'")))
}

fn src_text<'a>(node: Node<'a, '_>) -> Result<&'a str, FabricError> {
    node.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| FabricError::malformed("<src> element without wire name"))
}

fn is_pe_tile(tile: Node) -> bool {
    matches!(tile.attribute("type"), None | Some("pe_tile_new"))
}

fn bus_matches(node: Node, width: u8) -> bool {
    node.attribute("bus") == Some(format!("BUS{width}").as_str())
}

fn is_mem_tile(tile: Node) -> bool {
    tile.attribute("type") == Some("memory_tile")
}

fn pre_scan(root: Node) -> Result<PreScan, FabricError> {
    let mut rows = 0u16;
    let mut cols = 0u16;
    let mut num_tracks = HashMap::new();
    let mut bus_widths = BTreeSet::new();
    let mut pe_locations = HashSet::new();
    let mut mem_locations = HashSet::new();
    let mut mem_bounds = HashSet::new();
    let mut reg_slots = HashSet::new();
    let mut saw_tile = false;

    // Tiles are not assumed to arrive in grid order.
    for tile in elements(root, "tile") {
        saw_tile = true;
        let y = attr_u16(tile, "row")?;
        let x = attr_u16(tile, "col")?;
        rows = rows.max(y);
        cols = cols.max(x);

        for token in attr(tile, "tracks")?.split_whitespace() {
            let (bus, count) = token
                .split_once(':')
                .ok_or_else(|| FabricError::malformed(format!("malformed tracks token '{token}'")))?;
            let width = bus_width(bus)?;
            let count: u16 = count.parse().map_err(|_| {
                FabricError::malformed(format!("malformed track count in '{token}'"))
            })?;
            num_tracks.insert((x, y, width), count);
            bus_widths.insert(width);
        }

        if is_mem_tile(tile) {
            mem_locations.insert((x, y));
            let mut max_incr = 0;
            for sb in elements(tile, "sb") {
                let width = bus_width(attr(sb, "bus")?)?;
                let incr = attr_u16(sb, "row")?;
                max_incr = max_incr.max(incr);
                rows = rows.max(y + incr);
                // Lower memory rows carry the anchor row's track count.
                if let Some(&count) = num_tracks.get(&(x, y, width)) {
                    num_tracks.insert((x, y + incr, width), count);
                }
                // Register slots on memory rows are deliberately not
                // collected; registers may not land on memory tiles.
            }
            mem_bounds.insert((x, y, y + max_incr));
        } else if is_pe_tile(tile) {
            pe_locations.insert((x, y));
            for sb in elements(tile, "sb") {
                for mux in elements(sb, "mux") {
                    if mux.attribute("reg") == Some("1") {
                        let wire = parse_sb_wire(attr(mux, "snk")?)?;
                        reg_slots.insert((x, y, wire.track));
                    }
                }
            }
        } else {
            return Err(FabricError::malformed(format!(
                "tile ({x}, {y}) has unknown type '{}'",
                tile.attribute("type").unwrap_or_default()
            )));
        }
    }

    if !saw_tile {
        return Err(FabricError::malformed("fabric contains no tiles"));
    }

    Ok(PreScan {
        rows: rows + 1,
        cols: cols + 1,
        num_tracks,
        bus_widths,
        pe_locations,
        mem_locations,
        mem_bounds,
        reg_slots,
    })
}

/// Builds one bus-width layer. The `sb`/`mem_side`/`mem_named`/`pe` maps are
/// scaffolding for wire-name resolution and are dropped at [`finish`].
struct LayerBuilder<'a> {
    scan: &'a PreScan,
    width: u8,
    layer: FabricLayer,
    sb: HashMap<(u16, u16, Side, WireDir), Vec<PortId>>,
    mem_side: HashMap<(u16, u16, Side, WireDir), Vec<PortId>>,
    mem_named: HashMap<(u16, u16, String, WireDir), PortId>,
    pe: HashMap<(u16, u16, String), PortId>,
}

impl<'a> LayerBuilder<'a> {
    fn new(scan: &'a PreScan, width: u8) -> Self {
        Self {
            scan,
            width,
            layer: FabricLayer::new(width),
            sb: HashMap::new(),
            mem_side: HashMap::new(),
            mem_named: HashMap::new(),
            pe: HashMap::new(),
        }
    }

    fn tracks_at(&self, x: u16, y: u16) -> u16 {
        self.scan
            .num_tracks
            .get(&(x, y, self.width))
            .copied()
            .unwrap_or(0)
    }


    fn sorted_pe_locations(&self) -> Vec<(u16, u16)> {
        let mut locations: Vec<_> = self.scan.pe_locations.iter().copied().collect();
        locations.sort_unstable();
        locations
    }

    /// Phase 2: switch-box input ports per PE tile side, memory side ports,
    /// and fabric-edge inputs registered as sources.
    fn generate_layer(&mut self) {
        let cols = self.scan.cols;
        let rows = self.scan.rows;

        for (x, y) in self.sorted_pe_locations() {
            let count = self.tracks_at(x, y);
            for side in Side::ALL {
                let ports: Vec<PortId> = (0..count)
                    .map(|track| {
                        self.layer
                            .new_port(x, y, PortRole::Track { side, track }, PortDir::In)
                    })
                    .collect();
                self.sb.insert((x, y, side, WireDir::In), ports);
            }

            // Fabric-edge inputs double as routing sources.
            if x == 0 {
                self.register_edge_sources(x, y, Side::W);
            }
            if x == cols - 1 {
                self.register_edge_sources(x, y, Side::E);
            }
            if y == 0 {
                self.register_edge_sources(x, y, Side::N);
            }
            if y == rows - 1 {
                self.register_edge_sources(x, y, Side::S);
            }
        }

        let mut bounds: Vec<_> = self.scan.mem_bounds.iter().copied().collect();
        bounds.sort_unstable();
        for (x, top, bottom) in bounds {
            // North/south ports exist at the anchor row only; east/west
            // ports exist per spanned row but keep anchor-row coordinates.
            let ports_n: Vec<PortId> = (0..self.tracks_at(x, top))
                .map(|track| {
                    self.layer
                        .new_port(x, top, PortRole::Track { side: Side::N, track }, PortDir::In)
                })
                .collect();
            self.mem_side.insert((x, top, Side::N, WireDir::In), ports_n);

            let ports_s: Vec<PortId> = (0..self.tracks_at(x, bottom))
                .map(|track| {
                    self.layer
                        .new_port(x, top, PortRole::Track { side: Side::S, track }, PortDir::In)
                })
                .collect();
            self.mem_side
                .insert((x, bottom, Side::S, WireDir::In), ports_s);

            for y in top..=bottom {
                for side in [Side::W, Side::E] {
                    let ports: Vec<PortId> = (0..self.tracks_at(x, y))
                        .map(|track| {
                            self.layer
                                .new_port(x, top, PortRole::Track { side, track }, PortDir::In)
                        })
                        .collect();
                    self.mem_side.insert((x, y, side, WireDir::In), ports);
                }
            }
        }
    }

    fn register_edge_sources(&mut self, x: u16, y: u16, side: Side) {
        let ports = self.sb[&(x, y, side, WireDir::In)].clone();
        for (track, port) in ports.into_iter().enumerate() {
            self.layer
                .add_source(PortKey::Edge { x, y, track: track as u16 }, port);
        }
    }

    fn in_ports(&self, x: u16, y: u16, side: Side) -> Option<&Vec<PortId>> {
        self.sb
            .get(&(x, y, side, WireDir::In))
            .or_else(|| self.mem_side.get(&(x, y, side, WireDir::In)))
    }

    /// Phase 3: output port collections alias the neighbor's inputs; sides
    /// facing off the fabric get fresh output ports registered as sinks.
    fn connect_tiles(&mut self) {
        for (x, y) in self.sorted_pe_locations() {
            for side in Side::ALL {
                let neighbor = map_side(x, y, side)
                    .and_then(|(ax, ay, aside)| self.in_ports(ax, ay, aside).cloned());
                let ports = match neighbor {
                    Some(ports) => ports,
                    None => self.off_edge_ports(x, y, side),
                };
                self.sb.insert((x, y, side, WireDir::Out), ports);
            }
        }

        let mut mem_keys: Vec<(u16, u16, Side)> = self
            .mem_side
            .keys()
            .filter(|(_, _, _, dir)| *dir == WireDir::In)
            .map(|&(x, y, side, _)| (x, y, side))
            .collect();
        mem_keys.sort_unstable();
        for (x, y, side) in mem_keys {
            let neighbor = map_side(x, y, side)
                .and_then(|(ax, ay, aside)| self.in_ports(ax, ay, aside).cloned());
            let ports = match neighbor {
                Some(ports) => ports,
                None => self.off_edge_ports(x, y, side),
            };
            self.mem_side.insert((x, y, side, WireDir::Out), ports);
        }
    }

    fn off_edge_ports(&mut self, x: u16, y: u16, side: Side) -> Vec<PortId> {
        (0..self.tracks_at(x, y))
            .map(|track| {
                let port =
                    self.layer
                        .new_port(x, y, PortRole::Track { side, track }, PortDir::Out);
                // Sinks are indexed by the edge tile location, not a
                // fictitious off-fabric coordinate.
                self.layer.add_sink(PortKey::Edge { x, y, track }, port);
                port
            })
            .collect()
    }

    fn sb_port(&self, x: u16, y: u16, wire: WireName, name: &str) -> Result<PortId, FabricError> {
        self.sb
            .get(&(x, y, wire.side, wire.dir))
            .and_then(|ports| ports.get(wire.track as usize))
            .copied()
            .ok_or_else(|| FabricError::UnknownPort(format!("({x}, {y}) {name}")))
    }

    fn mem_side_port(
        &self,
        x: u16,
        y: u16,
        wire: WireName,
        name: &str,
    ) -> Result<PortId, FabricError> {
        self.mem_side
            .get(&(x, y, wire.side, wire.dir))
            .and_then(|ports| ports.get(wire.track as usize))
            .copied()
            .ok_or_else(|| FabricError::UnknownPort(format!("({x}, {y}) {name}")))
    }

    /// Phase 4: the PE output port plus connection-box input muxes.
    fn connect_pe(&mut self, root: Node) -> Result<(), FabricError> {
        let width = self.width;
        for tile in elements(root, "tile") {
            let y = attr_u16(tile, "row")?;
            let x = attr_u16(tile, "col")?;

            // Every tile exposes the single logical PE output.
            let out = self.layer.new_port(
                x,
                y,
                PortRole::Named {
                    resource: Resource::Pe,
                    name: "pe_out_res".into(),
                },
                PortDir::Out,
            );
            self.pe.insert((x, y, "pe_out_res".into()), out);
            self.layer
                .add_source(PortKey::named(x, y, "pe_out_res"), out);

            if !is_pe_tile(tile) {
                continue;
            }
            for cb in elements(tile, "cb").filter(|cb| bus_matches(*cb, width)) {
                for mux in elements(cb, "mux") {
                    let snk = attr(mux, "snk")?;
                    self.layer.add_port_name(Resource::Pe, snk);
                    let dst = self.layer.new_port(
                        x,
                        y,
                        PortRole::Named {
                            resource: Resource::Pe,
                            name: snk.into(),
                        },
                        PortDir::In,
                    );
                    self.pe.insert((x, y, snk.into()), dst);
                    self.layer.add_sink(PortKey::named(x, y, snk), dst);
                    for src in elements(mux, "src") {
                        let name = src_text(src)?;
                        let wire = parse_sb_wire(name)?;
                        let src_port = self.sb_port(x, y, wire, name)?;
                        self.layer.new_track(
                            src_port,
                            dst,
                            Some(TrackNote {
                                wires: (name.into(), snk.into()),
                                parent: TrackParent::Cb,
                            }),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Phase 5: memory-tile connection boxes.
    fn connect_mem_cb(&mut self, root: Node) -> Result<(), FabricError> {
        let width = self.width;
        for tile in elements(root, "tile").filter(|t| is_mem_tile(*t)) {
            let y = attr_u16(tile, "row")?;
            let x = attr_u16(tile, "col")?;
            for cb in elements(tile, "cb").filter(|cb| bus_matches(*cb, width)) {
                for mux in elements(cb, "mux") {
                    let snk = attr(mux, "snk")?;
                    self.layer.add_port_name(Resource::Mem, snk);
                    let dst = self.layer.new_port(
                        x,
                        y,
                        PortRole::Named {
                            resource: Resource::Mem,
                            name: snk.into(),
                        },
                        PortDir::In,
                    );
                    self.layer.add_sink(PortKey::named(x, y, snk), dst);
                    for src in elements(mux, "src") {
                        let name = src_text(src)?;
                        // Connection-box sources are always in_* side wires.
                        let wire = parse_mem_wire(name)?;
                        let src_port = self.mem_side_port(x, y, wire, name)?;
                        self.layer.new_track(
                            src_port,
                            dst,
                            Some(TrackNote {
                                wires: (name.into(), snk.into()),
                                parent: TrackParent::Cb,
                            }),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Gets or creates the named memory wire as a mux sink.
    fn mem_named_snk(&mut self, x: u16, tile_y: u16, name: &str) -> PortId {
        if let Some(&port) = self
            .mem_named
            .get(&(x, tile_y, name.to_string(), WireDir::In))
        {
            // No register between the halves, so in and out are one port.
            self.mem_named
                .insert((x, tile_y, name.into(), WireDir::Out), port);
            return port;
        }
        let port = self.layer.new_port(
            x,
            tile_y,
            PortRole::Named {
                resource: Resource::Mem,
                name: name.into(),
            },
            PortDir::In,
        );
        self.mem_named
            .insert((x, tile_y, name.into(), WireDir::In), port);
        self.mem_named
            .insert((x, tile_y, name.into(), WireDir::Out), port);
        port
    }

    /// Gets or creates the named memory wire as a mux source. Distinguished
    /// output wires become routable sources, registered at the referencing
    /// row.
    fn mem_named_src(&mut self, x: u16, tile_y: u16, y: u16, name: &str) -> PortId {
        if let Some(&port) = self
            .mem_named
            .get(&(x, tile_y, name.to_string(), WireDir::In))
        {
            return port;
        }
        let port = self.layer.new_port(
            x,
            tile_y,
            PortRole::Named {
                resource: Resource::Mem,
                name: name.into(),
            },
            PortDir::In,
        );
        self.mem_named
            .insert((x, tile_y, name.into(), WireDir::In), port);
        if MEM_SOURCE_WIRES.contains(&name) {
            self.layer.add_source(PortKey::named(x, y, name), port);
        }
        port
    }

    /// Phase 6: memory-tile internal switch wires. Named wires are resolved
    /// lazily; side wires go through the usual grammar.
    fn connect_mem_internal(&mut self, root: Node) -> Result<(), FabricError> {
        let width = self.width;
        for tile in elements(root, "tile").filter(|t| is_mem_tile(*t)) {
            let tile_y = attr_u16(tile, "row")?;
            let x = attr_u16(tile, "col")?;
            for sb in elements(tile, "sb").filter(|sb| bus_matches(*sb, width)) {
                let y = tile_y + attr_u16(sb, "row")?;
                for mux in elements(sb, "mux") {
                    let snk = attr(mux, "snk")?;
                    let snk_port = if snk.starts_with("out") {
                        let wire = parse_mem_wire(snk)?;
                        self.mem_side_port(x, y, wire, snk)?
                    } else {
                        self.mem_named_snk(x, tile_y, snk)
                    };
                    for src in elements(mux, "src") {
                        let name = src_text(src)?;
                        let src_port = if name.starts_with("in") {
                            let wire = parse_mem_wire(name)?;
                            self.mem_side_port(x, y, wire, name)?
                        } else {
                            self.mem_named_src(x, tile_y, y, name)
                        };
                        self.layer.new_track(
                            src_port,
                            snk_port,
                            Some(TrackNote {
                                wires: (name.into(), snk.into()),
                                parent: TrackParent::Sb,
                            }),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Phase 7: PE-tile switch-box muxes and feedthroughs.
    fn connect_sb(&mut self, root: Node) -> Result<(), FabricError> {
        let width = self.width;
        for tile in elements(root, "tile").filter(|t| is_pe_tile(*t)) {
            let y = attr_u16(tile, "row")?;
            let x = attr_u16(tile, "col")?;
            for sb in elements(tile, "sb").filter(|sb| bus_matches(*sb, width)) {
                for mux in elements(sb, "mux") {
                    let snk = attr(mux, "snk")?;
                    let snk_wire = parse_sb_wire(snk)?;
                    let dst = self.sb_port(x, y, snk_wire, snk)?;
                    for src in elements(mux, "src") {
                        let name = src_text(src)?;
                        let src_port = if name.starts_with("pe") {
                            *self
                                .pe
                                .get(&(x, y, "pe_out_res".to_string()))
                                .ok_or_else(|| {
                                    FabricError::UnknownPort(format!("({x}, {y}) {name}"))
                                })?
                        } else {
                            let wire = parse_sb_wire(name)?;
                            self.sb_port(x, y, wire, name)?
                        };
                        self.layer.new_track(
                            src_port,
                            dst,
                            Some(TrackNote {
                                wires: (name.into(), snk.into()),
                                parent: TrackParent::Sb,
                            }),
                        );
                    }
                }

                for ft in elements(sb, "ft") {
                    let snk = attr(ft, "snk")?;
                    let src = elements(ft, "src").next().ok_or_else(|| {
                        FabricError::malformed(format!(
                            "feedthrough '{snk}' at ({x}, {y}) has no source"
                        ))
                    })?;
                    let name = src_text(src)?;
                    let src_port = self.sb_port(x, y, parse_sb_wire(name)?, name)?;
                    let dst_port = self.sb_port(x, y, parse_sb_wire(snk)?, snk)?;
                    self.layer.new_track(
                        src_port,
                        dst_port,
                        Some(TrackNote {
                            wires: (name.into(), snk.into()),
                            parent: TrackParent::Sb,
                        }),
                    );
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> FabricLayer {
        self.layer.index_routable();
        self.layer
    }
}
