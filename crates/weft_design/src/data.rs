//! Core design graph data structures.

use crate::error::DesignError;
use std::collections::{BTreeMap, HashMap, HashSet};
use weft_common::{ModuleId, NetId, Resource};

/// A coarse-grained operator in the mapped design.
#[derive(Debug, Clone)]
pub struct Module {
    /// The unique ID of this module.
    pub id: ModuleId,
    /// Module name from the design file.
    pub name: String,
    /// The physical resource kind this module occupies.
    pub resource: Resource,
    /// Whether this module was fused into its producer during mapping.
    /// Fused modules are neither placed nor routed independently.
    pub fused: bool,
    /// Free-form attributes carried through from the mapper.
    pub attrs: BTreeMap<String, String>,
    /// Nets driving this module's inputs.
    pub inputs: Vec<NetId>,
    /// Nets driven by this module's outputs.
    pub outputs: Vec<NetId>,
}

/// A producer-consumer connection in the raw design graph.
#[derive(Debug, Clone)]
pub struct Net {
    /// The unique ID of this net.
    pub id: NetId,
    /// Driving module.
    pub src: ModuleId,
    /// Output port name on the driver (for example `pe_out_res`).
    pub src_port: String,
    /// Receiving module.
    pub dst: ModuleId,
    /// Input port name on the receiver (for example `a`, `b`).
    pub dst_port: String,
    /// Bus width in bits.
    pub width: u8,
}

/// A net between two non-fused modules, with fused chains contracted away.
///
/// Placement and routing constraints are always generated over virtual nets.
/// A virtual net restricted to one bus-width routing layer is the spec's
/// "physical net".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualNet {
    /// Non-fused driving module.
    pub src: ModuleId,
    /// Output port name on the (possibly contracted-to) driver.
    pub src_port: String,
    /// Non-fused receiving module.
    pub dst: ModuleId,
    /// Input port name on the receiver.
    pub dst_port: String,
    /// Bus width in bits.
    pub width: u8,
}

/// The mapped design graph: modules, nets, and the contracted virtual-net view.
#[derive(Debug, Clone)]
pub struct Design {
    modules: Vec<Module>,
    nets: Vec<Net>,
    module_by_name: HashMap<String, ModuleId>,
    virtual_nets: Vec<VirtualNet>,
}

impl Design {
    /// Assembles a design from modules and nets, validating fused fan-in and
    /// computing the virtual-net view.
    ///
    /// `modules` must already carry correct IDs and empty input/output lists;
    /// net membership is wired up here.
    pub fn new(mut modules: Vec<Module>, nets: Vec<Net>) -> Result<Self, DesignError> {
        let mut module_by_name = HashMap::new();
        for module in &modules {
            if module_by_name
                .insert(module.name.clone(), module.id)
                .is_some()
            {
                return Err(DesignError::DuplicateModule(module.name.clone()));
            }
        }

        for net in &nets {
            modules[net.src.as_raw() as usize].outputs.push(net.id);
            modules[net.dst.as_raw() as usize].inputs.push(net.id);
        }

        for module in &modules {
            if module.fused && module.inputs.len() > 1 {
                return Err(DesignError::FusedFanin {
                    module: module.name.clone(),
                    inputs: module.inputs.len(),
                });
            }
        }

        let virtual_nets = contract_nets(&modules, &nets);

        Ok(Self {
            modules,
            nets,
            module_by_name,
            virtual_nets,
        })
    }

    /// Returns the module with the given ID.
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.as_raw() as usize]
    }

    /// Returns the net with the given ID.
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.as_raw() as usize]
    }

    /// Looks a module up by name.
    pub fn module_by_name(&self, name: &str) -> Option<&Module> {
        self.module_by_name.get(name).map(|&id| self.module(id))
    }

    /// All modules, in ID order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// All raw nets, in ID order.
    pub fn nets(&self) -> impl Iterator<Item = &Net> {
        self.nets.iter()
    }

    /// Modules that participate in placement (non-fused).
    pub fn placeable(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter().filter(|m| !m.fused)
    }

    /// The contracted virtual-net view (both endpoints non-fused).
    pub fn virtual_nets(&self) -> &[VirtualNet] {
        &self.virtual_nets
    }

    /// Virtual nets restricted to one bus-width routing layer.
    pub fn physical_nets(&self, width: u8) -> impl Iterator<Item = (usize, &VirtualNet)> {
        self.virtual_nets
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.width == width)
    }

    /// The set of non-fused producers feeding `module`, with fused chains
    /// walked back to their non-fused source.
    pub fn contracted_inputs(&self, module: ModuleId) -> HashSet<ModuleId> {
        self.virtual_nets
            .iter()
            .filter(|n| n.dst == module)
            .map(|n| n.src)
            .collect()
    }

    /// Number of modules.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Number of raw nets.
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }
}

/// Contracts fused chains: every net whose receiver is non-fused becomes a
/// virtual net whose source is the nearest non-fused producer.
///
/// Nets terminating at a fused module disappear (their receiver is absorbed
/// into the consumer side of a later net); fused chains with no producer
/// (constants folded during mapping) yield no virtual net.
fn contract_nets(modules: &[Module], nets: &[Net]) -> Vec<VirtualNet> {
    let mut virtual_nets = Vec::new();
    for net in nets {
        if modules[net.dst.as_raw() as usize].fused {
            continue;
        }
        let mut src = net.src;
        let mut src_port = net.src_port.clone();
        while modules[src.as_raw() as usize].fused {
            let fused = &modules[src.as_raw() as usize];
            let Some(&feeder) = fused.inputs.first() else {
                // Orphan fused chain; nothing placeable drives it.
                break;
            };
            let feeder = &nets[feeder.as_raw() as usize];
            src = feeder.src;
            src_port = feeder.src_port.clone();
        }
        if modules[src.as_raw() as usize].fused {
            continue;
        }
        virtual_nets.push(VirtualNet {
            src,
            src_port,
            dst: net.dst,
            dst_port: net.dst_port.clone(),
            width: net.width,
        });
    }
    virtual_nets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: u32, name: &str, resource: Resource, fused: bool) -> Module {
        Module {
            id: ModuleId::from_raw(id),
            name: name.into(),
            resource,
            fused,
            attrs: BTreeMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn net(id: u32, src: u32, src_port: &str, dst: u32, dst_port: &str) -> Net {
        Net {
            id: NetId::from_raw(id),
            src: ModuleId::from_raw(src),
            src_port: src_port.into(),
            dst: ModuleId::from_raw(dst),
            dst_port: dst_port.into(),
            width: 16,
        }
    }

    #[test]
    fn wires_inputs_and_outputs() {
        let design = Design::new(
            vec![
                module(0, "a", Resource::Pe, false),
                module(1, "b", Resource::Pe, false),
            ],
            vec![net(0, 0, "pe_out_res", 1, "a")],
        )
        .unwrap();

        assert_eq!(design.module(ModuleId::from_raw(0)).outputs.len(), 1);
        assert_eq!(design.module(ModuleId::from_raw(1)).inputs.len(), 1);
        assert_eq!(design.virtual_nets().len(), 1);
    }

    #[test]
    fn duplicate_module_rejected() {
        let result = Design::new(
            vec![
                module(0, "a", Resource::Pe, false),
                module(1, "a", Resource::Pe, false),
            ],
            vec![],
        );
        assert!(matches!(result, Err(DesignError::DuplicateModule(_))));
    }

    #[test]
    fn fused_fanin_rejected() {
        let result = Design::new(
            vec![
                module(0, "a", Resource::Pe, false),
                module(1, "b", Resource::Pe, false),
                module(2, "f", Resource::Pe, true),
            ],
            vec![net(0, 0, "pe_out_res", 2, "a"), net(1, 1, "pe_out_res", 2, "b")],
        );
        assert!(matches!(result, Err(DesignError::FusedFanin { .. })));
    }

    #[test]
    fn fused_chain_contracts_to_producer() {
        // a -> f (fused) -> b  becomes the virtual net a -> b.
        let design = Design::new(
            vec![
                module(0, "a", Resource::Pe, false),
                module(1, "f", Resource::Pe, true),
                module(2, "b", Resource::Pe, false),
            ],
            vec![net(0, 0, "pe_out_res", 1, "a"), net(1, 1, "pe_out_res", 2, "b")],
        )
        .unwrap();

        let vnets = design.virtual_nets();
        assert_eq!(vnets.len(), 1);
        assert_eq!(vnets[0].src, ModuleId::from_raw(0));
        assert_eq!(vnets[0].src_port, "pe_out_res");
        assert_eq!(vnets[0].dst, ModuleId::from_raw(2));
        assert_eq!(vnets[0].dst_port, "b");
    }

    #[test]
    fn orphan_fused_chain_yields_no_virtual_net() {
        let design = Design::new(
            vec![
                module(0, "const", Resource::Pe, true),
                module(1, "b", Resource::Pe, false),
            ],
            vec![net(0, 0, "pe_out_res", 1, "a")],
        )
        .unwrap();
        assert!(design.virtual_nets().is_empty());
    }

    #[test]
    fn contracted_inputs() {
        let design = Design::new(
            vec![
                module(0, "a", Resource::Pe, false),
                module(1, "f", Resource::Pe, true),
                module(2, "b", Resource::Pe, false),
            ],
            vec![net(0, 0, "pe_out_res", 1, "a"), net(1, 1, "pe_out_res", 2, "b")],
        )
        .unwrap();

        let inputs = design.contracted_inputs(ModuleId::from_raw(2));
        assert_eq!(inputs.len(), 1);
        assert!(inputs.contains(&ModuleId::from_raw(0)));
    }

    #[test]
    fn physical_nets_filter_by_width() {
        let mut n1 = net(0, 0, "pe_out_res", 1, "a");
        n1.width = 1;
        let n16 = net(1, 0, "pe_out_res", 1, "b");
        let design = Design::new(
            vec![
                module(0, "a", Resource::Pe, false),
                module(1, "b", Resource::Pe, false),
            ],
            vec![n1, n16],
        )
        .unwrap();

        assert_eq!(design.physical_nets(16).count(), 1);
        assert_eq!(design.physical_nets(1).count(), 1);
        assert_eq!(design.virtual_nets().len(), 2);
    }
}
