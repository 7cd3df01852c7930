//! I/O helpers for line sets, JSON reports and assignment overlays.
//!
//! - `load_line_set`: read `{ width, height, lines: [[x1,y1,x2,y2], ...] }`.
//! - `write_json_file`: pretty-print a serializable value to disk.
//! - `save_assignment_overlay`: draw segments colored by VP onto a canvas or
//!   a background image and save it as PNG.
use crate::types::{ImageSize, Line2D};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Line segments detected on one image.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LineSet {
    pub width: u32,
    pub height: u32,
    pub lines: Vec<Line2D>,
    /// Optional image to draw overlays on, relative to the line-set file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<PathBuf>,
}

impl LineSet {
    pub fn image_size(&self) -> ImageSize {
        ImageSize {
            width: self.width,
            height: self.height,
        }
    }
}

/// Load a line set from JSON. A relative `background` is resolved against
/// the file's directory.
pub fn load_line_set(path: &Path) -> Result<LineSet, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read line set {}: {e}", path.display()))?;
    let mut set: LineSet = serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse line set {}: {e}", path.display()))?;
    if let (Some(bg), Some(dir)) = (set.background.as_mut(), path.parent()) {
        if bg.is_relative() {
            *bg = dir.join(&*bg);
        }
    }
    Ok(set)
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

const VP_COLORS: [[u8; 3]; 3] = [[220, 40, 40], [40, 170, 60], [40, 80, 220]];
const UNASSIGNED_COLOR: [u8; 3] = [150, 150, 150];

/// Color for a line assigned to VP `k` (gray when unassigned).
pub fn assignment_color(assignment: Option<usize>) -> Rgb<u8> {
    match assignment {
        Some(k) => Rgb(VP_COLORS[k % VP_COLORS.len()]),
        None => Rgb(UNASSIGNED_COLOR),
    }
}

/// Render `lines` colored by `associations` (index-aligned).
pub fn render_assignment_overlay(
    size: ImageSize,
    background: Option<&Path>,
    lines: &[Line2D],
    associations: &[Option<usize>],
) -> Result<RgbImage, String> {
    let mut canvas = match background {
        Some(path) => image::open(path)
            .map_err(|e| format!("Failed to open {}: {e}", path.display()))?
            .into_rgb8(),
        None => RgbImage::from_pixel(size.width, size.height, Rgb([255, 255, 255])),
    };
    for (i, line) in lines.iter().enumerate() {
        let color = assignment_color(associations.get(i).copied().flatten());
        draw_segment(&mut canvas, line, color);
    }
    Ok(canvas)
}

pub fn save_assignment_overlay(
    path: &Path,
    size: ImageSize,
    background: Option<&Path>,
    lines: &[Line2D],
    associations: &[Option<usize>],
) -> Result<(), String> {
    let canvas = render_assignment_overlay(size, background, lines, associations)?;
    ensure_parent_dir(path)?;
    canvas
        .save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Sample the segment at unit pixel spacing; out-of-bounds pixels are skipped.
fn draw_segment(canvas: &mut RgbImage, line: &Line2D, color: Rgb<u8>) {
    let steps = line.length().ceil().max(1.0) as usize;
    let (w, h) = (canvas.width() as f64, canvas.height() as f64);
    for s in 0..=steps {
        let t = s as f64 / steps as f64;
        let x = (line.p0[0] + t * line.dx()).round();
        let y = (line.p0[1] + t * line.dy()).round();
        if x >= 0.0 && y >= 0.0 && x < w && y < h {
            canvas.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}
