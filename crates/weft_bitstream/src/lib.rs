//! Bitstream generation for placed-and-routed Weft designs.
//!
//! Converts a [`PlacementState`] and [`RoutingState`] into the textual
//! configuration consumed by the loader: one `place` line per module and
//! one mux-configuration line per routed track, resolved through the
//! fabric builder's track annotation table. Every track appearing in the
//! routing state must carry an annotation; a miss is a hard error, not a
//! skip.

#![warn(missing_docs)]

use weft_design::Design;
use weft_fabric::{Fabric, FabricError, TrackParent};
use weft_pnr::{Placement, PlacementState, RoutingState};

/// Errors raised while generating a bitstream.
#[derive(Debug, thiserror::Error)]
pub enum BitstreamError {
    /// A routed track has no annotation in the fabric's side table.
    #[error("track {0} has no bitstream annotation")]
    MissingAnnotation(String),

    /// The requested routing layer does not exist.
    #[error(transparent)]
    Fabric(#[from] FabricError),
}

/// Renders the bitstream text for a placed-and-routed design.
///
/// With `annotate`, every net is prefixed by its debug route trace as
/// comments.
pub fn generate(
    fabric: &Fabric,
    design: &Design,
    placement: &PlacementState,
    routing: &RoutingState,
    width: u8,
    annotate: bool,
) -> Result<String, BitstreamError> {
    let layer = fabric
        .layer(width)
        .ok_or(FabricError::UnknownLayer(width))?;
    let mut out = String::new();

    out.push_str("# weft bitstream\n");
    out.push_str(&format!(
        "# fabric {}x{} tracks {}\n",
        fabric.cols(),
        fabric.rows(),
        fabric.num_tracks()
    ));

    let mut records: Vec<_> = placement
        .iter()
        .map(|(module, &p)| (design.module(module).name.clone(), p))
        .collect();
    records.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, p) in records {
        match p {
            Placement::Tile { x, y } => {
                out.push_str(&format!("place {name} {x} {y}\n"));
            }
            Placement::Reg { x, y, track, side } => {
                let side = side.map(|s| s.letter()).unwrap_or("-");
                out.push_str(&format!("place {name} {x} {y} {track} {side}\n"));
            }
        }
    }

    for (index, routed) in routing.iter() {
        let net = &design.virtual_nets()[index];
        out.push_str(&format!(
            "net {index} {}.{} -> {}.{} BUS{width}\n",
            design.module(net.src).name,
            net.src_port,
            design.module(net.dst).name,
            net.dst_port,
        ));
        if annotate {
            for node in &routed.trace {
                out.push_str(&format!("# via {node}\n"));
            }
        }
        for step in &routed.steps {
            let note = layer
                .note(step.track)
                .ok_or_else(|| BitstreamError::MissingAnnotation(step.track.to_string()))?;
            // The configured tile is the one owning the mux source wire.
            let src = layer.port(step.src);
            let kind = match note.parent {
                TrackParent::Cb => "CB",
                TrackParent::Sb => "SB",
            };
            out.push_str(&format!(
                "  {kind} ({}, {}) {} -> {}\n",
                src.x, src.y, note.wires.0, note.wires.1
            ));
        }
    }

    log::info!(
        "bitstream: {} placements, {} nets",
        placement.len(),
        routing.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_design::parse_design;
    use weft_fabric::parse_fabric;
    use weft_pnr::{PlacementRecord, PnrConfig, PnrFlow, ROUTE_WIDTH};

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

    fn routed_flow() -> PnrFlow {
        let fabric = parse_fabric(&fabric_xml()).unwrap();
        let design = parse_design(
            r#"{
                "modules": [
                    { "name": "a", "resource": "PE" },
                    { "name": "b", "resource": "PE" }
                ],
                "nets": [
                    { "src": "a", "src_port": "out", "dst": "b", "dst_port": "a", "width": 16 }
                ]
            }"#,
        )
        .unwrap();
        let mut flow = PnrFlow::new(fabric, design, PnrConfig::default());
        flow.seed_placement(&[
            PlacementRecord {
                module: "a".into(),
                placement: weft_pnr::Placement::Tile { x: 0, y: 0 },
            },
            PlacementRecord {
                module: "b".into(),
                placement: weft_pnr::Placement::Tile { x: 1, y: 0 },
            },
        ])
        .unwrap();
        flow.place().unwrap();
        flow.route().unwrap();
        flow
    }

    #[test]
    fn bitstream_contains_placements_and_tracks() {
        let flow = routed_flow();
        let text = generate(
            flow.fabric(),
            flow.design(),
            flow.placement(),
            flow.routing(),
            ROUTE_WIDTH,
            false,
        )
        .unwrap();

        assert!(text.contains("place a 0 0"));
        assert!(text.contains("place b 1 0"));
        assert!(text.contains("net 0 a.pe_out_res -> b.a BUS16"));
        // At least one switch-box and one connection-box configuration.
        assert!(text.lines().any(|l| l.trim_start().starts_with("SB ")));
        assert!(text.lines().any(|l| l.trim_start().starts_with("CB ")));
        assert!(!text.contains("# via"));
    }

    #[test]
    fn annotated_bitstream_includes_trace() {
        let flow = routed_flow();
        let text = generate(
            flow.fabric(),
            flow.design(),
            flow.placement(),
            flow.routing(),
            ROUTE_WIDTH,
            true,
        )
        .unwrap();
        assert!(text.contains("# via (0,0)PE_out"));
        assert!(text.contains("# via (1,0)PE_a"));
    }

    #[test]
    fn missing_layer_is_an_error() {
        let flow = routed_flow();
        let result = generate(
            flow.fabric(),
            flow.design(),
            flow.placement(),
            flow.routing(),
            8,
            false,
        );
        assert!(matches!(result, Err(BitstreamError::Fabric(_))));
    }
}
