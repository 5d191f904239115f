//! Subcommand implementations.

use crate::{Cli, Command};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use weft_design::load_design;
use weft_fabric::load_fabric;
use weft_pnr::{PlacementRecord, PnrConfig, PnrFlow, RouteStep, ROUTE_WIDTH};

/// A serializable routing report entry, one per routed net.
#[derive(Debug, Serialize)]
struct RoutingRecord<'a> {
    src: &'a str,
    src_port: &'a str,
    dst: &'a str,
    dst_port: &'a str,
    width: u8,
    steps: &'a [RouteStep],
    trace: &'a [String],
}

/// Dispatches the parsed command line.
pub fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::PlaceDesign {
            design,
            fabric,
            out,
        } => place_design(&design, &fabric, config, out.as_deref()),
        Command::RouteDesign {
            design,
            fabric,
            placement,
            out,
        } => route_design(&design, &fabric, config, placement.as_deref(), out.as_deref()),
        Command::WriteBitstream {
            design,
            fabric,
            output,
            annotate,
        } => write_bitstream(&design, &fabric, config, &output, annotate),
        Command::Print { design, fabric } => print_report(&design, &fabric, config),
    }
}

fn load_config(path: Option<&Path>) -> Result<PnrConfig, Box<dyn Error>> {
    match path {
        Some(path) => Ok(PnrConfig::load(path)?),
        None => {
            let default_path = PathBuf::from("weft.toml");
            if default_path.exists() {
                Ok(PnrConfig::load(&default_path)?)
            } else {
                Ok(PnrConfig::default())
            }
        }
    }
}

fn load_flow(
    design_path: &Path,
    fabric_path: &Path,
    config: PnrConfig,
) -> Result<PnrFlow, Box<dyn Error>> {
    log::info!("loading design: {}", design_path.display());
    let design = load_design(design_path)?;
    log::info!("loading fabric: {}", fabric_path.display());
    let fabric = load_fabric(fabric_path)?;
    Ok(PnrFlow::new(fabric, design, config))
}

fn emit(text: &str, out: Option<&Path>) -> Result<(), Box<dyn Error>> {
    match out {
        Some(path) => std::fs::write(path, text)?,
        None => println!("{text}"),
    }
    Ok(())
}

fn place_design(
    design: &Path,
    fabric: &Path,
    config: PnrConfig,
    out: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let mut flow = load_flow(design, fabric, config)?;
    let outcome = flow.place()?;
    log::info!("placement complete ({outcome:?})");
    let records = flow.placement().to_records(flow.design());
    emit(&serde_json::to_string_pretty(&records)?, out)
}

fn route_design(
    design: &Path,
    fabric: &Path,
    config: PnrConfig,
    placement: Option<&Path>,
    out: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let mut flow = load_flow(design, fabric, config)?;
    if let Some(path) = placement {
        let records: Vec<PlacementRecord> =
            serde_json::from_str(&std::fs::read_to_string(path)?)?;
        flow.seed_placement(&records)?;
    }
    flow.place()?;
    flow.route()?;
    log::info!("routing complete");

    let design = flow.design();
    let records: Vec<RoutingRecord> = flow
        .routing()
        .iter()
        .map(|(index, routed)| {
            let net = &design.virtual_nets()[index];
            RoutingRecord {
                src: &design.module(net.src).name,
                src_port: &net.src_port,
                dst: &design.module(net.dst).name,
                dst_port: &net.dst_port,
                width: net.width,
                steps: &routed.steps,
                trace: &routed.trace,
            }
        })
        .collect();
    emit(&serde_json::to_string_pretty(&records)?, out)
}

fn write_bitstream(
    design: &Path,
    fabric: &Path,
    config: PnrConfig,
    output: &Path,
    annotate: bool,
) -> Result<(), Box<dyn Error>> {
    let mut flow = load_flow(design, fabric, config)?;
    flow.place()?;
    flow.route()?;
    let text = weft_bitstream::generate(
        flow.fabric(),
        flow.design(),
        flow.placement(),
        flow.routing(),
        ROUTE_WIDTH,
        annotate,
    )?;
    std::fs::write(output, text)?;
    log::info!("bitstream written to {}", output.display());
    Ok(())
}

fn print_report(design: &Path, fabric: &Path, config: PnrConfig) -> Result<(), Box<dyn Error>> {
    let mut flow = load_flow(design, fabric, config)?;
    flow.place()?;
    flow.route()?;

    println!("Placement info:");
    for record in flow.placement().to_records(flow.design()) {
        match record.placement {
            weft_pnr::Placement::Tile { x, y } => {
                println!("  {} -> ({x}, {y})", record.module);
            }
            weft_pnr::Placement::Reg { x, y, track, side } => {
                let side = side.map(|s| s.letter()).unwrap_or("-");
                println!("  {} -> ({x}, {y}) track {track} side {side}", record.module);
            }
        }
    }

    println!("\nRouting info:");
    let design = flow.design();
    for (index, routed) in flow.routing().iter() {
        let net = &design.virtual_nets()[index];
        println!(
            "  {}.{} -> {}.{}:",
            design.module(net.src).name,
            net.src_port,
            design.module(net.dst).name,
            net.dst_port,
        );
        for node in &routed.trace {
            println!("    {node}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fabric_xml() -> String {
        let mut xml = String::from("<cgra>\n");
        for row in 0..2 {
            for col in 0..2 {
                xml.push_str(&format!(
                    "<tile row=\"{row}\" col=\"{col}\" tracks=\"BUS16:2\">\n  <cb bus=\"BUS16\">\n"
                ));
                for (port, track) in [("a", 0), ("b", 1)] {
                    xml.push_str(&format!("    <mux snk=\"{port}\">"));
                    for side in ["N", "S", "E", "W"] {
                        xml.push_str(&format!("<src>in_BUS16_{side}_{track}</src>"));
                    }
                    xml.push_str("</mux>\n");
                }
                xml.push_str("  </cb>\n  <sb bus=\"BUS16\">\n");
                for track in 0..2 {
                    for side in ["N", "S", "E", "W"] {
                        xml.push_str(&format!(
                            "    <mux snk=\"out_BUS16_{side}_{track}\"><src>pe_out_res</src>"
                        ));
                        for other in ["N", "S", "E", "W"] {
                            if other != side {
                                xml.push_str(&format!("<src>in_BUS16_{other}_{track}</src>"));
                            }
                        }
                        xml.push_str("</mux>\n");
                    }
                }
                xml.push_str("  </sb>\n</tile>\n");
            }
        }
        xml.push_str("</cgra>\n");
        xml
    }

    const DESIGN: &str = r#"{
        "modules": [
            { "name": "a", "resource": "PE" },
            { "name": "b", "resource": "PE" }
        ],
        "nets": [
            { "src": "a", "src_port": "out", "dst": "b", "dst_port": "a", "width": 16 }
        ]
    }"#;

    fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn place_then_route_via_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let design = write_temp(&dir, "design.json", DESIGN);
        let fabric = write_temp(&dir, "fabric.xml", &fabric_xml());
        let placement = dir.path().join("placement.json");
        let routing = dir.path().join("routing.json");

        place_design(&design, &fabric, PnrConfig::default(), Some(&placement)).unwrap();
        let records: Vec<PlacementRecord> =
            serde_json::from_str(&std::fs::read_to_string(&placement).unwrap()).unwrap();
        assert_eq!(records.len(), 2);

        route_design(
            &design,
            &fabric,
            PnrConfig::default(),
            Some(&placement),
            Some(&routing),
        )
        .unwrap();
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&routing).unwrap()).unwrap();
        assert_eq!(report.as_array().unwrap().len(), 1);
        assert_eq!(report[0]["src"], "a");
        assert_eq!(report[0]["dst"], "b");
    }

    #[test]
    fn bitstream_command_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let design = write_temp(&dir, "design.json", DESIGN);
        let fabric = write_temp(&dir, "fabric.xml", &fabric_xml());
        let output = dir.path().join("design.bs");

        write_bitstream(&design, &fabric, PnrConfig::default(), &output, true).unwrap();
        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.starts_with("# weft bitstream"));
        assert!(text.contains("# via"));
    }

    #[test]
    fn config_file_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_temp(&dir, "weft.toml", "dist_factor = 2\n");
        let config = load_config(Some(config_path.as_path())).unwrap();
        assert_eq!(config.dist_factor, 2);
    }

    #[test]
    fn bad_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_temp(&dir, "weft.toml", "solver = \"z3\"\n");
        assert!(load_config(Some(config_path.as_path())).is_err());
    }
}
