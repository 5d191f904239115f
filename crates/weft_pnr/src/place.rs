//! Placement engine: constraint emission, the strict/relaxed driver, and
//! the post-placement register passes.

use crate::config::{Adjacency, PnrConfig};
use crate::error::PnrError;
use crate::position::Position;
use crate::state::{Placement, PlacementState};
use std::collections::HashMap;
use weft_common::{ModuleId, Resource, Side};
use weft_design::Design;
use weft_fabric::Fabric;
use weft_solver::{Session, SolveOutcome};

/// Which constraint set produced the placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    /// The configured adjacency constraint held.
    Strict,
    /// Placement succeeded only after dropping adjacency.
    Relaxed,
}

/// The placement engine.
///
/// Emits legality, pinning, distinctness, register-color, adjacency, and
/// I/O constraints over one solver session per attempt. The driver tries
/// the strict set first and retries without adjacency on UNSAT; this retry
/// is the engine's only local recovery.
pub struct Placer<'a> {
    fabric: &'a Fabric,
    design: &'a Design,
    config: &'a PnrConfig,
}

impl<'a> Placer<'a> {
    /// Creates a placer over a fabric, design, and configuration.
    pub fn new(fabric: &'a Fabric, design: &'a Design, config: &'a PnrConfig) -> Self {
        Self {
            fabric,
            design,
            config,
        }
    }

    /// Places every non-fused module, writing coordinates into `state`.
    ///
    /// Modules already present in `state` are pinned. Returns how strict a
    /// constraint set succeeded, or [`PnrError::Unplaceable`] if neither
    /// does.
    pub fn place(&self, state: &mut PlacementState) -> Result<PlaceOutcome, PnrError> {
        if self.attempt(Some(self.config.adjacency()), state)? {
            log::info!("placement satisfied the strict constraint set");
            return Ok(PlaceOutcome::Strict);
        }
        log::info!("strict placement unsatisfiable; retrying without adjacency");
        if self.attempt(None, state)? {
            return Ok(PlaceOutcome::Relaxed);
        }
        Err(PnrError::Unplaceable)
    }

    /// One solver session over one constraint set. Returns whether it was
    /// satisfiable (and if so, fills `state`).
    fn attempt(
        &self,
        adjacency: Option<Adjacency>,
        state: &mut PlacementState,
    ) -> Result<bool, PnrError> {
        let mut sess = Session::new(&self.config.solver, self.config.budget())?;
        let mut vars: HashMap<ModuleId, Position> = HashMap::new();

        // Init invariants: every non-fused module gets a legal position.
        for module in self.design.placeable() {
            let pos = Position::new(
                &mut sess,
                self.fabric,
                self.config.register_width,
                module.resource,
            );
            let legal = pos.invariants(&mut sess, self.fabric);
            sess.assert_(legal);
            vars.insert(module.id, pos);
        }

        // Pinning: modules already placed keep their coordinates.
        for module in self.design.placeable() {
            if let Some(placement) = state.get(module.id) {
                let pin = vars[&module.id].encode(&mut sess, placement);
                sess.assert_(pin);
            }
        }

        // Distinctness: same-resource modules may not share a flat
        // position; registers may, if their pipeline colors differ.
        let placeable: Vec<_> = self.design.placeable().collect();
        for (i, m1) in placeable.iter().enumerate() {
            for m2 in placeable.iter().skip(i + 1) {
                if m1.resource != m2.resource {
                    continue;
                }
                let differ = {
                    let f1 = vars[&m1.id].flat();
                    let f2 = vars[&m2.id].flat();
                    sess.neq(&f1, &f2)
                };
                let constraint = if m1.resource == Resource::Reg {
                    let colors_differ = {
                        let c1 = vars[&m1.id].color().cloned();
                        let c2 = vars[&m2.id].color().cloned();
                        match (c1, c2) {
                            (Some(c1), Some(c2)) => sess.neq(&c1, &c2),
                            _ => differ,
                        }
                    };
                    sess.or(&[differ, colors_differ])
                } else {
                    differ
                };
                sess.assert_(constraint);
            }
        }

        // Register color propagation along Reg-to-Reg nets.
        for net in self.design.virtual_nets() {
            let src = self.design.module(net.src);
            let dst = self.design.module(net.dst);
            if src.resource == Resource::Reg && dst.resource == Resource::Reg {
                if let (Some(c1), Some(c2)) = (
                    vars[&net.src].color().cloned(),
                    vars[&net.dst].color().cloned(),
                ) {
                    let same = sess.eq(&c1, &c2);
                    sess.assert_(same);
                }
            }
        }

        // Adjacency over every virtual net.
        if let Some(adjacency) = adjacency {
            let offsets = adjacency_offsets(adjacency);
            for net in self.design.virtual_nets() {
                let src = &vars[&net.src];
                let dst = &vars[&net.dst];
                let mut options = Vec::with_capacity(offsets.len());
                for &(dx, dy) in &offsets {
                    let cx = src.delta_x(&mut sess, dst, dx, self.fabric.cols());
                    let cy = src.delta_y(&mut sess, dst, dy, self.fabric.rows());
                    options.push(sess.and(&[cx, cy]));
                }
                let near = sess.or(&options);
                sess.assert_(near);
            }
        }

        // I/O modules sit on the edge ring.
        for module in placeable.iter().filter(|m| m.resource == Resource::Io) {
            let ring = vars[&module.id].on_edge_ring(&mut sess);
            sess.assert_(ring);
        }

        match sess.solve()? {
            SolveOutcome::Unsat => Ok(false),
            SolveOutcome::Sat => {
                for (&module, pos) in &vars {
                    state.insert(module, pos.read(&sess)?);
                }
                Ok(true)
            }
        }
    }
}

/// The `(|dx|, |dy|)` offsets a connected pair may sit at.
fn adjacency_offsets(adjacency: Adjacency) -> Vec<(u16, u16)> {
    match adjacency {
        Adjacency::NearestNeighbor => vec![(0, 1), (1, 0)],
        Adjacency::Radius(r) => {
            let r = r as u16;
            let mut offsets = Vec::new();
            for dx in 0..=r {
                for dy in 0..=r {
                    if dx + dy > 0 && dx + dy <= r {
                        offsets.push((dx, dy));
                    }
                }
            }
            offsets
        }
    }
}

/// Assigns each placed register's in-port side from the position of the
/// module its output drives.
///
/// A vertical consumer port (`a`, `c`) selects the north/south pair; the
/// chosen side faces the *producer* (opposite the consumer direction), so
/// the split port's incoming tracks arrive from upstream and its outgoing
/// tracks continue downstream.
pub fn assign_register_sides(
    design: &Design,
    state: &mut PlacementState,
) -> Result<(), PnrError> {
    for module in design
        .placeable()
        .filter(|m| m.resource == Resource::Reg)
    {
        let Some(&Placement::Reg { x, y, track, side }) = state.get(module.id) else {
            return Err(PnrError::MissingPlacement(module.name.clone()));
        };
        if side.is_some() {
            continue;
        }

        // A register can drive several nets; any placed consumer decides.
        let mut driven = None;
        for net in design.virtual_nets().iter().filter(|n| n.src == module.id) {
            if state.contains(net.dst) {
                driven = Some(net);
            }
        }

        let side = match driven {
            Some(net) => {
                let consumer = design.module(net.dst);
                let (cx, cy) = state
                    .get(net.dst)
                    .map(Placement::xy)
                    .ok_or_else(|| PnrError::MissingPlacement(consumer.name.clone()))?;
                let vertical = consumer.resource == Resource::Pe
                    && matches!(net.dst_port.as_str(), "a" | "c");
                upstream_side((x, y), (cx, cy), vertical)
            }
            None => {
                log::warn!(
                    "register '{}' drives no placed module; defaulting side to W",
                    module.name
                );
                Side::W
            }
        };

        state.insert(
            module.id,
            Placement::Reg {
                x,
                y,
                track,
                side: Some(side),
            },
        );
    }
    Ok(())
}

/// The in-port side a register should occupy given its slot and the driven
/// module's position: opposite the direction of travel, on the vertical
/// axis when the consumer port demands it.
fn upstream_side(from: (u16, u16), to: (u16, u16), vertical: bool) -> Side {
    let dx = to.0 as i32 - from.0 as i32;
    let dy = to.1 as i32 - from.1 as i32;
    if vertical && dy != 0 {
        if dy > 0 {
            Side::N
        } else {
            Side::S
        }
    } else if !vertical && dx != 0 {
        if dx > 0 {
            Side::W
        } else {
            Side::E
        }
    } else if dy.abs() >= dx.abs() && dy != 0 {
        if dy > 0 {
            Side::N
        } else {
            Side::S
        }
    } else if dx != 0 {
        if dx > 0 {
            Side::W
        } else {
            Side::E
        }
    } else {
        Side::W
    }
}

/// Materializes pipeline-register ports: assigns sides, then splits each
/// placed register's port on the given routing layer. Idempotent per slot
/// key, so colored registers sharing a slot resolve to one port pair.
pub fn split_registers(
    fabric: &mut Fabric,
    design: &Design,
    state: &mut PlacementState,
    width: u8,
) -> Result<(), PnrError> {
    assign_register_sides(design, state)?;
    for module in design
        .placeable()
        .filter(|m| m.resource == Resource::Reg)
    {
        let Some(&Placement::Reg {
            x,
            y,
            track,
            side: Some(side),
        }) = state.get(module.id)
        else {
            return Err(PnrError::MissingPlacement(module.name.clone()));
        };
        fabric.split_register(width, x, y, track, side)?;
        log::debug!(
            "register '{}' split at ({x}, {y}) track {track} side {side}",
            module.name
        );
    }
    Ok(())
}
