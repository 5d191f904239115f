//! Routing engine: fabric-graph construction, reachability, exclusivity,
//! and distance constraints, plus the post-solve model reader.

use crate::config::PnrConfig;
use crate::error::PnrError;
use crate::state::{Placement, PlacementState, RoutedNet, RouteStep, RoutingState};
use std::collections::HashMap;
use weft_common::{ModuleId, PortId, Resource, TrackId};
use weft_design::{Design, VirtualNet};
use weft_fabric::{Fabric, FabricError, FabricLayer, PortKey};
use weft_solver::{EdgeRef, GraphId, NodeRef, Session, SolveOutcome};

/// The routing engine for one bus-width layer.
///
/// Builds a single shared reachability graph over the layer's ports and
/// tracks (every net references the same graph), then asserts per-net
/// reachability and distance bounds plus the driver-exclusivity constraints
/// that keep unconnected modules apart.
pub struct Router<'a> {
    fabric: &'a Fabric,
    design: &'a Design,
    config: &'a PnrConfig,
    width: u8,
}

/// Scaffolding shared by the constraint emitters and the model reader.
struct RouteGraph {
    graph: GraphId,
    nodes: HashMap<PortId, NodeRef>,
    edge_tracks: HashMap<EdgeRef, TrackId>,
}

impl<'a> Router<'a> {
    /// Creates a router over a placed design for one routing layer.
    pub fn new(fabric: &'a Fabric, design: &'a Design, config: &'a PnrConfig, width: u8) -> Self {
        Self {
            fabric,
            design,
            config,
            width,
        }
    }

    /// Routes every physical net of this layer's width, writing track
    /// sequences into `rstate`.
    pub fn route(
        &self,
        pstate: &PlacementState,
        rstate: &mut RoutingState,
    ) -> Result<(), PnrError> {
        let layer = self
            .fabric
            .layer(self.width)
            .ok_or(FabricError::UnknownLayer(self.width))?;
        let nets: Vec<(usize, &VirtualNet)> = self.design.physical_nets(self.width).collect();
        if nets.is_empty() {
            log::info!("no {}-bit nets to route", self.width);
            return Ok(());
        }

        let mut sess = Session::new(&self.config.solver, self.config.budget())?;
        let rg = self.build_graph(&mut sess, layer, pstate);
        log::info!(
            "routing graph: {} nodes, {} edges, {} nets",
            sess.graph(rg.graph).node_count(),
            sess.graph(rg.graph).edge_count(),
            nets.len()
        );

        let endpoints = self.assert_reachability(&mut sess, layer, pstate, &rg, &nets)?;
        self.assert_exclusivity(&mut sess, layer, pstate, &rg, &nets)?;

        match sess.solve()? {
            SolveOutcome::Unsat => Err(PnrError::Unroutable),
            SolveOutcome::Sat => self.read_model(&sess, layer, &rg, &nets, &endpoints, rstate),
        }
    }

    /// Graph construction: named nodes for every used PE location's ports,
    /// then one edge per track, skipping tracks that leave unused PEs.
    fn build_graph(
        &self,
        sess: &mut Session,
        layer: &FabricLayer,
        pstate: &PlacementState,
    ) -> RouteGraph {
        let graph = sess.add_graph();
        let mut nodes: HashMap<PortId, NodeRef> = HashMap::new();

        let pe_ports: Vec<String> = layer
            .port_names(Resource::Pe)
            .map(str::to_string)
            .collect();
        let mut used: Vec<(u16, u16)> = pstate.occupied().collect();
        used.sort_unstable();
        for &(x, y) in &used {
            for port in &pe_ports {
                if let Some(pid) = layer.sink(&PortKey::named(x, y, port)) {
                    let node = sess.add_node(graph, &format!("({x},{y})PE_{port}"));
                    nodes.insert(pid, node);
                }
            }
            if let Some(pid) = layer.source(&PortKey::named(x, y, "pe_out_res")) {
                let node = sess.add_node(graph, &format!("({x},{y})PE_out"));
                nodes.insert(pid, node);
            }
        }

        let mut edge_tracks: HashMap<EdgeRef, TrackId> = HashMap::new();
        for track in layer.tracks() {
            let src = layer.port(track.src);
            // Tracks leaving a PE nobody occupies can never carry a signal.
            if src.resource() == Some(Resource::Pe) && !pstate.is_occupied(src.x, src.y) {
                continue;
            }
            let from = node_for(sess, graph, &mut nodes, track.src, &src.name);
            let dst_name = layer.port(track.dst).name.clone();
            let to = node_for(sess, graph, &mut nodes, track.dst, &dst_name);
            let edge = sess.add_edge(graph, from, to);
            edge_tracks.insert(edge, track.id);
        }

        RouteGraph {
            graph,
            nodes,
            edge_tracks,
        }
    }

    /// Reachability and distance bounds per net. Returns each net's
    /// `(source node, sink node)` pair for the model reader.
    fn assert_reachability(
        &self,
        sess: &mut Session,
        layer: &FabricLayer,
        pstate: &PlacementState,
        rg: &RouteGraph,
        nets: &[(usize, &VirtualNet)],
    ) -> Result<Vec<(NodeRef, NodeRef)>, PnrError> {
        let mut endpoints = Vec::with_capacity(nets.len());
        for &(_, net) in nets {
            let (src_pid, src_pos) =
                self.resolve(layer, pstate, net.src, &net.src_port, false)?;
            let (dst_pid, dst_pos) = self.resolve(layer, pstate, net.dst, &net.dst_port, true)?;
            let from = *rg
                .nodes
                .get(&src_pid)
                .ok_or_else(|| PnrError::MissingPort(layer.port(src_pid).name.clone()))?;
            let to = *rg
                .nodes
                .get(&dst_pid)
                .ok_or_else(|| PnrError::MissingPort(layer.port(dst_pid).name.clone()))?;

            let reach = sess.reaches(rg.graph, from, to);
            sess.assert_(reach);

            // A tile hop costs at least two graph edges through ports, and
            // the fabric's vertical/horizontal port asymmetry often pushes
            // past that, hence the 3x factor and the +1 slack.
            let manhattan =
                (src_pos.0.abs_diff(dst_pos.0) + src_pos.1.abs_diff(dst_pos.1)) as u32;
            let bound = 3 * self.config.dist_factor * manhattan + 1;
            let within = sess.distance_leq(rg.graph, from, to, bound);
            sess.assert_(within);

            endpoints.push((from, to));
        }
        Ok(endpoints)
    }

    /// Driver exclusivity: a net's source may not reach its destination's
    /// other input ports, and modules that are not contracted inputs of a
    /// module may not reach it at all.
    fn assert_exclusivity(
        &self,
        sess: &mut Session,
        layer: &FabricLayer,
        pstate: &PlacementState,
        rg: &RouteGraph,
        nets: &[(usize, &VirtualNet)],
    ) -> Result<(), PnrError> {
        // Connected pairs: keep the source away from the wrong input ports.
        let pe_ports: Vec<String> = layer
            .port_names(Resource::Pe)
            .map(str::to_string)
            .collect();
        for &(_, net) in nets {
            if self.design.module(net.dst).resource != Resource::Pe {
                continue;
            }
            let (src_pid, _) = self.resolve(layer, pstate, net.src, &net.src_port, false)?;
            let Some(&from) = rg.nodes.get(&src_pid) else {
                continue;
            };
            let (dx, dy) = pstate
                .get(net.dst)
                .map(Placement::xy)
                .ok_or_else(|| {
                    PnrError::MissingPlacement(self.design.module(net.dst).name.clone())
                })?;
            for port in pe_ports.iter().filter(|p| **p != net.dst_port) {
                let Some(pid) = layer.sink(&PortKey::named(dx, dy, port)) else {
                    continue;
                };
                let Some(&to) = rg.nodes.get(&pid) else {
                    continue;
                };
                let reach = sess.reaches(rg.graph, from, to);
                sess.assert_(reach.negate());
            }
        }

        // Unconnected pairs: nothing but a module's contracted inputs may
        // drive any of its input ports.
        let placeable: Vec<_> = self.design.placeable().collect();
        for m1 in &placeable {
            let inputs = self.design.contracted_inputs(m1.id);
            let sink_nodes: Vec<NodeRef> = self
                .module_sink_ports(layer, pstate, m1.id)
                .into_iter()
                .filter_map(|pid| rg.nodes.get(&pid).copied())
                .collect();
            if sink_nodes.is_empty() {
                continue;
            }
            for m2 in &placeable {
                if m2.id == m1.id || inputs.contains(&m2.id) {
                    continue;
                }
                for src_pid in self.module_source_ports(layer, pstate, m2.id) {
                    let Some(&from) = rg.nodes.get(&src_pid) else {
                        continue;
                    };
                    for &to in &sink_nodes {
                        let reach = sess.reaches(rg.graph, from, to);
                        sess.assert_(reach.negate());
                    }
                }
            }
        }
        Ok(())
    }

    /// Reads the routed path of every net out of the model, enforcing the
    /// single-driver invariant while recording track steps.
    fn read_model(
        &self,
        sess: &Session,
        layer: &FabricLayer,
        rg: &RouteGraph,
        nets: &[(usize, &VirtualNet)],
        endpoints: &[(NodeRef, NodeRef)],
        rstate: &mut RoutingState,
    ) -> Result<(), PnrError> {
        let mut drivers: HashMap<PortId, ModuleId> = HashMap::new();
        for (&(index, net), &(from, to)) in nets.iter().zip(endpoints) {
            // The solver asserted reachability, so a path must exist; a
            // miss here would be an encoding bug.
            let Some((node_path, edge_path)) = sess.route_path(rg.graph, from, to)? else {
                return Err(PnrError::Unroutable);
            };
            let trace: Vec<String> = node_path
                .iter()
                .map(|&n| sess.graph(rg.graph).node_name(n).to_string())
                .collect();

            let mut steps = Vec::with_capacity(edge_path.len());
            for edge in edge_path {
                let track_id = rg.edge_tracks[&edge];
                let track = layer.track(track_id);
                if let Some(&prev) = drivers.get(&track.dst) {
                    if prev != net.src {
                        return Err(PnrError::IllegalRouting {
                            track: layer.port(track.dst).name.clone(),
                            driver_a: self.design.module(prev).name.clone(),
                            driver_b: self.design.module(net.src).name.clone(),
                        });
                    }
                }
                drivers.insert(track.dst, net.src);
                steps.push(RouteStep {
                    track: track_id,
                    src: track.src,
                    dst: track.dst,
                    width: self.width,
                });
            }
            log::debug!(
                "net {index}: {} steps via {}",
                steps.len(),
                trace.join(" -> ")
            );
            rstate.insert(index, RoutedNet { steps, trace });
        }
        Ok(())
    }

    /// Resolves a net endpoint to a fabric port and tile position.
    ///
    /// PE and memory endpoints append the port name to the placed location
    /// (memory ports may be registered on any spanned row); registers use
    /// their split slot key; I/O endpoints use the edge track named by the
    /// port, defaulting to track 0.
    fn resolve(
        &self,
        layer: &FabricLayer,
        pstate: &PlacementState,
        module: ModuleId,
        port: &str,
        want_sink: bool,
    ) -> Result<(PortId, (u16, u16)), PnrError> {
        let name = &self.design.module(module).name;
        let placement = *pstate
            .get(module)
            .ok_or_else(|| PnrError::MissingPlacement(name.clone()))?;
        let lookup = |key: &PortKey| {
            if want_sink {
                layer.sink(key)
            } else {
                layer.source(key)
            }
        };
        let missing = |key: &PortKey| PnrError::MissingPort(key.to_string());

        match (self.design.module(module).resource, placement) {
            (Resource::Pe, Placement::Tile { x, y }) => {
                let key = PortKey::named(x, y, port);
                Ok((lookup(&key).ok_or_else(|| missing(&key))?, (x, y)))
            }
            (Resource::Mem, Placement::Tile { x, y }) => {
                let (top, bottom) = self.fabric.mem_span(x, y).unwrap_or((y, y));
                for row in top..=bottom {
                    let key = PortKey::named(x, row, port);
                    if let Some(pid) = lookup(&key) {
                        return Ok((pid, (x, y)));
                    }
                }
                Err(missing(&PortKey::named(x, y, port)))
            }
            (Resource::Io, Placement::Tile { x, y }) => {
                let track = port.parse().unwrap_or(0);
                let key = PortKey::Edge { x, y, track };
                Ok((lookup(&key).ok_or_else(|| missing(&key))?, (x, y)))
            }
            (
                Resource::Reg,
                Placement::Reg {
                    x,
                    y,
                    track,
                    side: Some(side),
                },
            ) => {
                let key = PortKey::Track { x, y, track, side };
                Ok((lookup(&key).ok_or_else(|| missing(&key))?, (x, y)))
            }
            (Resource::Reg, Placement::Reg { side: None, .. }) => Err(PnrError::MissingPort(
                format!("register '{name}' has no side assigned"),
            )),
            _ => Err(PnrError::MissingPlacement(name.clone())),
        }
    }

    /// Every source port a module can drive the fabric from.
    fn module_source_ports(
        &self,
        layer: &FabricLayer,
        pstate: &PlacementState,
        module: ModuleId,
    ) -> Vec<PortId> {
        let m = self.design.module(module);
        let mut ports: Vec<&str> = match m.resource {
            Resource::Pe => vec!["pe_out_res"],
            Resource::Mem | Resource::Reg | Resource::Io => m
                .outputs
                .iter()
                .map(|&n| self.design.net(n).src_port.as_str())
                .collect(),
        };
        ports.sort_unstable();
        ports.dedup();
        if ports.is_empty() && m.resource != Resource::Pe {
            ports.push("0");
        }
        ports
            .into_iter()
            .filter_map(|port| self.resolve(layer, pstate, module, port, false).ok())
            .map(|(pid, _)| pid)
            .collect()
    }

    /// Every sink port through which a module can legally be driven.
    fn module_sink_ports(
        &self,
        layer: &FabricLayer,
        pstate: &PlacementState,
        module: ModuleId,
    ) -> Vec<PortId> {
        let m = self.design.module(module);
        let ports: Vec<String> = match m.resource {
            Resource::Pe => layer
                .port_names(Resource::Pe)
                .map(str::to_string)
                .collect(),
            Resource::Mem => layer
                .port_names(Resource::Mem)
                .map(str::to_string)
                .collect(),
            Resource::Reg | Resource::Io => vec!["0".to_string()],
        };
        ports
            .iter()
            .filter_map(|port| self.resolve(layer, pstate, module, port, true).ok())
            .map(|(pid, _)| pid)
            .collect()
    }
}

fn node_for(
    sess: &mut Session,
    graph: GraphId,
    nodes: &mut HashMap<PortId, NodeRef>,
    port: PortId,
    name: &str,
) -> NodeRef {
    if let Some(&node) = nodes.get(&port) {
        return node;
    }
    let node = sess.add_node(graph, name);
    nodes.insert(port, node);
    node
}
