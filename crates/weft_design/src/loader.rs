//! JSON loader for mapped design files.
//!
//! The mapper emits a flat JSON document:
//!
//! ```json
//! {
//!   "modules": [
//!     { "name": "add_0", "resource": "PE", "fused": false, "attrs": {} }
//!   ],
//!   "nets": [
//!     { "src": "add_0", "src_port": "pe_out_res",
//!       "dst": "add_1", "dst_port": "a", "width": 16 }
//!   ]
//! }
//! ```
//!
//! `src_port` values of `out` on PE modules are normalized to the fabric's
//! canonical PE output name `pe_out_res`.

use crate::data::{Design, Module, Net};
use crate::error::DesignError;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use weft_common::{ModuleId, NetId, Resource};

/// The canonical PE output port name used throughout the fabric.
pub const PE_OUT: &str = "pe_out_res";

#[derive(Debug, Deserialize)]
struct RawDesign {
    modules: Vec<RawModule>,
    #[serde(default)]
    nets: Vec<RawNet>,
}

#[derive(Debug, Deserialize)]
struct RawModule {
    name: String,
    resource: Resource,
    #[serde(default)]
    fused: bool,
    #[serde(default)]
    attrs: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawNet {
    src: String,
    src_port: String,
    dst: String,
    dst_port: String,
    width: u8,
}

/// Loads a mapped design from a JSON file.
pub fn load_design(path: &Path) -> Result<Design, DesignError> {
    let text = std::fs::read_to_string(path)?;
    parse_design(&text)
}

/// Parses a mapped design from JSON text.
pub fn parse_design(text: &str) -> Result<Design, DesignError> {
    let raw: RawDesign = serde_json::from_str(text)?;

    let mut by_name: HashMap<&str, ModuleId> = HashMap::new();
    let mut modules = Vec::with_capacity(raw.modules.len());
    for (index, m) in raw.modules.iter().enumerate() {
        let id = ModuleId::from_raw(index as u32);
        if by_name.insert(m.name.as_str(), id).is_some() {
            return Err(DesignError::DuplicateModule(m.name.clone()));
        }
        modules.push(Module {
            id,
            name: m.name.clone(),
            resource: m.resource,
            fused: m.fused,
            attrs: m.attrs.clone(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
    }

    let mut nets = Vec::with_capacity(raw.nets.len());
    for (index, n) in raw.nets.iter().enumerate() {
        if n.width != 1 && n.width != 16 {
            return Err(DesignError::UnsupportedWidth {
                net_index: index,
                width: n.width,
            });
        }
        let src = *by_name
            .get(n.src.as_str())
            .ok_or_else(|| DesignError::UnknownModule {
                net_index: index,
                name: n.src.clone(),
            })?;
        let dst = *by_name
            .get(n.dst.as_str())
            .ok_or_else(|| DesignError::UnknownModule {
                net_index: index,
                name: n.dst.clone(),
            })?;

        let src_port = if modules[src.as_raw() as usize].resource == Resource::Pe
            && n.src_port == "out"
        {
            PE_OUT.to_string()
        } else {
            n.src_port.clone()
        };

        nets.push(Net {
            id: NetId::from_raw(index as u32),
            src,
            src_port,
            dst,
            dst_port: n.dst_port.clone(),
            width: n.width,
        });
    }

    Design::new(modules, nets)
}
