//! Plan rendering
//!
//! Paints an assembled plan as a PNG overview: one filled hexagon per cell,
//! colored by the cell's builder and biome tags. Used by the CLI and for
//! eyeballing compositions; the engine itself never depends on it.

use image::{ImageBuffer, Rgb, RgbImage};
use std::error::Error;
use std::path::Path;

use crate::assemble::AssembledPlan;
use crate::composition::ParamMap;
use crate::hex::Hex;

/// Pixel size of one hex cell.
const HEX_SIZE: f64 = 12.0;
const BACKGROUND: Rgb<u8> = Rgb([24, 26, 34]);

/// Flat color for a cell based on its builder/biome tags.
fn cell_color(params: &ParamMap) -> Rgb<u8> {
    if params.contains_key("g_village") {
        return Rgb([196, 148, 90]);
    }
    if params.contains_key("road") {
        return Rgb([170, 140, 100]);
    }
    if params.contains_key("river") {
        return Rgb([90, 150, 220]);
    }
    match params.get("g_builder").map(String::as_str) {
        Some("ocean") => Rgb([28, 60, 120]),
        Some("coast") => Rgb([216, 200, 150]),
        Some("island") => Rgb([110, 160, 80]),
        Some("mountain") => Rgb([140, 130, 125]),
        Some("village") | Some("town") => Rgb([196, 148, 90]),
        _ => match params.get("biome").map(String::as_str) {
            Some("forest") => Rgb([50, 110, 55]),
            Some("plains") => Rgb([130, 170, 85]),
            Some("desert") => Rgb([220, 195, 130]),
            Some("swamp") => Rgb([80, 100, 70]),
            _ => Rgb([100, 120, 100]),
        },
    }
}

/// Render the plan to a PNG file.
pub fn render_plan(plan: &AssembledPlan, path: &Path) -> Result<(), Box<dyn Error>> {
    if plan.cells.is_empty() {
        return Err("plan has no cells to render".into());
    }

    // Cartesian bounds of all cell centers
    let mut min_x = f64::MAX;
    let mut max_x = f64::MIN;
    let mut min_z = f64::MAX;
    let mut max_z = f64::MIN;
    for hex in plan.cells.keys() {
        let (x, z) = hex.to_cartesian(HEX_SIZE);
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_z = min_z.min(z);
        max_z = max_z.max(z);
    }
    let margin = 2.0 * HEX_SIZE;
    let width = (max_x - min_x + 2.0 * margin).ceil() as u32;
    let height = (max_z - min_z + 2.0 * margin).ceil() as u32;

    let mut img: RgbImage = ImageBuffer::from_pixel(width, height, BACKGROUND);
    for (hex, params) in &plan.cells {
        draw_hex(&mut img, *hex, min_x - margin, min_z - margin, cell_color(params));
    }

    img.save(path)?;
    Ok(())
}

/// Paint one pointy-top hexagon by scanning its bounding box.
fn draw_hex(img: &mut RgbImage, hex: Hex, offset_x: f64, offset_z: f64, color: Rgb<u8>) {
    let (cx, cz) = hex.to_cartesian(HEX_SIZE);
    let cx = cx - offset_x;
    let cz = cz - offset_z;
    let half_width = 3.0_f64.sqrt() * HEX_SIZE / 2.0;

    let x0 = ((cx - half_width).floor().max(0.0)) as u32;
    let x1 = ((cx + half_width).ceil().min(img.width() as f64 - 1.0)) as u32;
    let z0 = ((cz - HEX_SIZE).floor().max(0.0)) as u32;
    let z1 = ((cz + HEX_SIZE).ceil().min(img.height() as f64 - 1.0)) as u32;

    for pz in z0..=z1 {
        for px in x0..=x1 {
            let dx = (px as f64 - cx).abs() / half_width;
            let dz = (pz as f64 - cz).abs() / HEX_SIZE;
            // Inside test for a pointy-top hexagon, with a thin gap between
            // cells so the lattice stays visible
            if dx <= 0.96 && dz <= 0.96 && dx + dz / 2.0 <= 0.96 {
                img.put_pixel(px, pz, color);
            }
        }
    }
}
