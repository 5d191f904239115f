//! Solver position variables, polymorphic over resource kind.

use crate::state::Placement;
use weft_common::{Resource, Side};
use weft_fabric::Fabric;
use weft_solver::{bits_needed, BitVec, Bool, Session, SolverError};

/// Coordinate variables for a tile-granular module (PE, memory, I/O).
#[derive(Debug, Clone)]
pub struct TilePos {
    x: BitVec,
    y: BitVec,
}

/// Coordinate variables for a pipeline register: a switch-box slot plus the
/// pipeline-color tag.
///
/// The `side` field exists so pre-placed registers can be pinned exactly,
/// but it is excluded from [`flat`](Position::flat): the model reader
/// recomputes the side from the driven module's position, and distinctness
/// must act on the physical slot `(x, y, track)` alone.
#[derive(Debug, Clone)]
pub struct RegPos {
    x: BitVec,
    y: BitVec,
    track: BitVec,
    side: BitVec,
    color: BitVec,
}

/// A module's placement variables.
///
/// All variants share the capability set `{invariants, flat, delta_x,
/// delta_y, encode}`; registers additionally expose their color.
#[derive(Debug, Clone)]
pub enum Position {
    /// Processing element.
    Pe(TilePos),
    /// Memory tile (anchor row).
    Mem(TilePos),
    /// Fabric-edge I/O.
    Io(TilePos),
    /// Pipeline register.
    Reg(RegPos),
}

impl Position {
    /// Allocates fresh coordinate variables for a module of the given
    /// resource kind.
    pub fn new(
        sess: &mut Session,
        fabric: &Fabric,
        register_width: usize,
        resource: Resource,
    ) -> Position {
        let x_bits = bits_needed(fabric.cols().saturating_sub(1));
        let y_bits = bits_needed(fabric.rows().saturating_sub(1));
        let tile = |sess: &mut Session| TilePos {
            x: sess.bv_var(x_bits),
            y: sess.bv_var(y_bits),
        };
        match resource {
            Resource::Pe => Position::Pe(tile(sess)),
            Resource::Mem => Position::Mem(tile(sess)),
            Resource::Io => Position::Io(tile(sess)),
            Resource::Reg => {
                let max_track = fabric
                    .reg_slots()
                    .iter()
                    .map(|&(_, _, t)| t)
                    .max()
                    .unwrap_or(0);
                Position::Reg(RegPos {
                    x: sess.bv_var(x_bits),
                    y: sess.bv_var(y_bits),
                    track: sess.bv_var(bits_needed(max_track)),
                    side: sess.bv_var(2),
                    color: sess.bv_var(register_width),
                })
            }
        }
    }

    fn tile(&self) -> (&BitVec, &BitVec) {
        match self {
            Position::Pe(p) | Position::Mem(p) | Position::Io(p) => (&p.x, &p.y),
            Position::Reg(p) => (&p.x, &p.y),
        }
    }

    /// The resource-specific legality predicate: coordinates restricted to
    /// the fabric locations this kind of module may occupy.
    pub fn invariants(&self, sess: &mut Session, fabric: &Fabric) -> Bool {
        match self {
            Position::Pe(p) => at_any_location(sess, p, fabric.locations(Resource::Pe)),
            Position::Mem(p) => at_any_location(sess, p, fabric.locations(Resource::Mem)),
            Position::Io(p) => at_any_location(sess, p, &fabric.io_locations()),
            Position::Reg(p) => {
                let mut slots: Vec<_> = fabric.reg_slots().iter().copied().collect();
                slots.sort_unstable();
                let options: Vec<Bool> = slots
                    .into_iter()
                    .map(|(x, y, track)| {
                        let cx = sess.eq_const(&p.x, x as u64);
                        let cy = sess.eq_const(&p.y, y as u64);
                        let ct = sess.eq_const(&p.track, track as u64);
                        sess.and(&[cx, cy, ct])
                    })
                    .collect();
                sess.or(&options)
            }
        }
    }

    /// The canonical concatenation of coordinate fields, for distinctness.
    pub fn flat(&self) -> BitVec {
        match self {
            Position::Pe(p) | Position::Mem(p) | Position::Io(p) => p.x.concat(&p.y),
            Position::Reg(p) => p.x.concat(&p.y).concat(&p.track),
        }
    }

    /// The pipeline-color field, present on registers only.
    pub fn color(&self) -> Option<&BitVec> {
        match self {
            Position::Reg(p) => Some(&p.color),
            _ => None,
        }
    }

    /// Predicate: `|x - other.x| = k`, by enumeration over the column range.
    pub fn delta_x(&self, sess: &mut Session, other: &Position, k: u16, cols: u16) -> Bool {
        let (ax, _) = self.tile();
        let (bx, _) = other.tile();
        delta_eq(sess, ax, bx, k, cols)
    }

    /// Predicate: `|y - other.y| = k`, by enumeration over the row range.
    pub fn delta_y(&self, sess: &mut Session, other: &Position, k: u16, rows: u16) -> Bool {
        let (_, ay) = self.tile();
        let (_, by) = other.tile();
        delta_eq(sess, ay, by, k, rows)
    }

    /// Equality with a literal placement, used to pin pre-placed modules.
    ///
    /// A placement of the wrong shape is unencodable and yields `false`.
    pub fn encode(&self, sess: &mut Session, placement: &Placement) -> Bool {
        match (self, placement) {
            (
                Position::Pe(p) | Position::Mem(p) | Position::Io(p),
                Placement::Tile { x, y },
            ) => {
                let cx = sess.eq_const(&p.x, *x as u64);
                let cy = sess.eq_const(&p.y, *y as u64);
                sess.and(&[cx, cy])
            }
            (Position::Reg(p), Placement::Reg { x, y, track, side }) => {
                let mut terms = vec![
                    sess.eq_const(&p.x, *x as u64),
                    sess.eq_const(&p.y, *y as u64),
                ];
                let ct = sess.eq_const(&p.track, *track as u64);
                terms.push(ct);
                if let Some(side) = side {
                    let cs = sess.eq_const(&p.side, side.index() as u64);
                    terms.push(cs);
                }
                sess.and(&terms)
            }
            _ => Bool::Const(false),
        }
    }

    /// Predicate: the position sits on the fabric edge ring (`x = 0` or
    /// `y = 0`).
    pub fn on_edge_ring(&self, sess: &mut Session) -> Bool {
        let (x, y) = self.tile();
        let cx = sess.eq_const(x, 0);
        let cy = sess.eq_const(y, 0);
        sess.or(&[cx, cy])
    }

    /// Reads the placed coordinates back from a satisfying model.
    ///
    /// Register sides are not model-assigned; they stay `None` until the
    /// register-side pass.
    pub fn read(&self, sess: &Session) -> Result<Placement, SolverError> {
        match self {
            Position::Pe(p) | Position::Mem(p) | Position::Io(p) => Ok(Placement::Tile {
                x: sess.value_bv(&p.x)? as u16,
                y: sess.value_bv(&p.y)? as u16,
            }),
            Position::Reg(p) => Ok(Placement::Reg {
                x: sess.value_bv(&p.x)? as u16,
                y: sess.value_bv(&p.y)? as u16,
                track: sess.value_bv(&p.track)? as u16,
                side: None,
            }),
        }
    }

    /// Reads the register color from a satisfying model.
    pub fn read_color(&self, sess: &Session) -> Result<Option<u64>, SolverError> {
        match self {
            Position::Reg(p) => Ok(Some(sess.value_bv(&p.color)?)),
            _ => Ok(None),
        }
    }
}

fn at_any_location(
    sess: &mut Session,
    pos: &TilePos,
    locations: &std::collections::HashSet<(u16, u16)>,
) -> Bool {
    let mut sorted: Vec<_> = locations.iter().copied().collect();
    sorted.sort_unstable();
    let options: Vec<Bool> = sorted
        .into_iter()
        .map(|(x, y)| {
            let cx = sess.eq_const(&pos.x, x as u64);
            let cy = sess.eq_const(&pos.y, y as u64);
            sess.and(&[cx, cy])
        })
        .collect();
    sess.or(&options)
}

fn delta_eq(sess: &mut Session, a: &BitVec, b: &BitVec, k: u16, range: u16) -> Bool {
    if k == 0 {
        return sess.eq(a, b);
    }
    let mut options = Vec::new();
    for v in 0..range {
        if v + k < range {
            let ca = sess.eq_const(a, v as u64);
            let cb = sess.eq_const(b, (v + k) as u64);
            options.push(sess.and(&[ca, cb]));
        }
        if v >= k {
            let ca = sess.eq_const(a, v as u64);
            let cb = sess.eq_const(b, (v - k) as u64);
            options.push(sess.and(&[ca, cb]));
        }
    }
    sess.or(&options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap, HashSet};
    use weft_solver::SolveOutcome;

    fn fabric_3x3() -> Fabric {
        let pe: HashSet<(u16, u16)> = (0..3)
            .flat_map(|x| (0..3).map(move |y| (x, y)))
            .collect();
        let regs = [(1, 1, 0), (1, 1, 1), (2, 1, 0)].into_iter().collect();
        Fabric::new(
            3,
            3,
            2,
            pe,
            HashSet::new(),
            HashMap::new(),
            regs,
            BTreeMap::new(),
        )
    }

    fn session() -> Session {
        Session::new("glucose", None).unwrap()
    }

    #[test]
    fn pe_legality() {
        let fabric = fabric_3x3();
        let mut sess = session();
        let pos = Position::new(&mut sess, &fabric, 2, Resource::Pe);
        let inv = pos.invariants(&mut sess, &fabric);
        sess.assert_(inv);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Sat);
        let Placement::Tile { x, y } = pos.read(&sess).unwrap() else {
            panic!("expected tile placement");
        };
        assert!(x < 3 && y < 3);
    }

    #[test]
    fn reg_legality_restricts_to_slots() {
        let fabric = fabric_3x3();
        let mut sess = session();
        let pos = Position::new(&mut sess, &fabric, 2, Resource::Reg);
        let inv = pos.invariants(&mut sess, &fabric);
        sess.assert_(inv);
        // Forbid two of the three slots.
        let not_a = pos
            .encode(&mut sess, &Placement::Reg { x: 1, y: 1, track: 0, side: None })
            .negate();
        let not_b = pos
            .encode(&mut sess, &Placement::Reg { x: 1, y: 1, track: 1, side: None })
            .negate();
        sess.assert_(not_a);
        sess.assert_(not_b);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Sat);
        assert_eq!(
            pos.read(&sess).unwrap(),
            Placement::Reg { x: 2, y: 1, track: 0, side: None }
        );
    }

    #[test]
    fn mem_legality_empty_is_unsat() {
        let fabric = fabric_3x3();
        let mut sess = session();
        let pos = Position::new(&mut sess, &fabric, 2, Resource::Mem);
        let inv = pos.invariants(&mut sess, &fabric);
        sess.assert_(inv);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Unsat);
    }

    #[test]
    fn encode_pins_exactly() {
        let fabric = fabric_3x3();
        let mut sess = session();
        let pos = Position::new(&mut sess, &fabric, 2, Resource::Pe);
        let inv = pos.invariants(&mut sess, &fabric);
        sess.assert_(inv);
        let pin = pos.encode(&mut sess, &Placement::Tile { x: 2, y: 0 });
        sess.assert_(pin);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Sat);
        assert_eq!(pos.read(&sess).unwrap(), Placement::Tile { x: 2, y: 0 });
    }

    #[test]
    fn encode_shape_mismatch_is_false() {
        let fabric = fabric_3x3();
        let mut sess = session();
        let pos = Position::new(&mut sess, &fabric, 2, Resource::Pe);
        let pin = pos.encode(
            &mut sess,
            &Placement::Reg { x: 0, y: 0, track: 0, side: None },
        );
        assert_eq!(pin, Bool::Const(false));
    }

    #[test]
    fn delta_constraints() {
        let fabric = fabric_3x3();
        let mut sess = session();
        let a = Position::new(&mut sess, &fabric, 2, Resource::Pe);
        let b = Position::new(&mut sess, &fabric, 2, Resource::Pe);
        for pos in [&a, &b] {
            let inv = pos.invariants(&mut sess, &fabric);
            sess.assert_(inv);
        }
        let pin = a.encode(&mut sess, &Placement::Tile { x: 1, y: 1 });
        sess.assert_(pin);
        let dx = a.delta_x(&mut sess, &b, 1, 3);
        let dy = a.delta_y(&mut sess, &b, 0, 3);
        sess.assert_(dx);
        sess.assert_(dy);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Sat);
        let Placement::Tile { x, y } = b.read(&sess).unwrap() else {
            panic!("expected tile placement");
        };
        assert_eq!(y, 1);
        assert!(x == 0 || x == 2);
    }

    #[test]
    fn io_edge_ring() {
        let fabric = fabric_3x3();
        let mut sess = session();
        let pos = Position::new(&mut sess, &fabric, 2, Resource::Io);
        let inv = pos.invariants(&mut sess, &fabric);
        sess.assert_(inv);
        let ring = pos.on_edge_ring(&mut sess);
        sess.assert_(ring);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Sat);
        let Placement::Tile { x, y } = pos.read(&sess).unwrap() else {
            panic!("expected tile placement");
        };
        assert!(x == 0 || y == 0);
    }
}
