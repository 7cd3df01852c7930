use crate::error::VpError;
use crate::geometry::Intrinsics;
use crate::pipeline::PipelineParams;
use crate::sdp::SolverParams;
use crate::search::SearchParams;
use crate::types::ImageSize;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct VpDemoConfig {
    /// Line-set JSON files, processed independently.
    pub inputs: Vec<PathBuf>,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub lines: LinesConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub output: DemoOutputConfig,
}

impl VpDemoConfig {
    pub fn resolve_pipeline_params(&self) -> PipelineParams {
        let mut params = self.lines.resolve();
        params.search = self.search.resolve();
        params
    }
}

/// Known camera. Without `focal_px` intrinsics are guessed per image.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CameraConfig {
    pub focal_px: Option<f64>,
    /// Defaults to the image center.
    pub principal_point: Option<[f64; 2]>,
}

impl CameraConfig {
    pub fn resolve(&self, size: ImageSize) -> Result<Option<Intrinsics>, VpError> {
        let Some(f) = self.focal_px else {
            return Ok(None);
        };
        let [cx, cy] = self
            .principal_point
            .unwrap_or([size.width as f64 * 0.5, size.height as f64 * 0.5]);
        Intrinsics::from_focal(f, cx, cy).map(Some)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LinesConfig {
    pub min_length: Option<f64>,
    pub min_lines: Option<usize>,
    pub use_uncertainty: Option<bool>,
}

impl LinesConfig {
    pub fn resolve(&self) -> PipelineParams {
        let mut params = PipelineParams::default();
        if let Some(v) = self.min_length {
            params.min_line_length = v;
        }
        if let Some(v) = self.min_lines {
            params.min_lines = v;
        }
        if let Some(v) = self.use_uncertainty {
            params.use_uncertainty = v;
        }
        params
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    pub inlier_cos_thresh: Option<f64>,
    pub sample_size: Option<usize>,
    pub fast_path: Option<bool>,
    pub eigen_ratio_thresh: Option<f64>,
    pub min_vp_scale: Option<f64>,
    pub histogram_bins: Option<usize>,
    pub max_iterations: Option<usize>,
    pub triad_tolerance: Option<f64>,
    pub seed: Option<u64>,
    pub solver: Option<SolverParams>,
}

impl SearchConfig {
    pub fn resolve(&self) -> SearchParams {
        let mut params = SearchParams::default();
        if let Some(v) = self.inlier_cos_thresh {
            params.inlier_cos_thresh = v;
        }
        if let Some(v) = self.sample_size {
            params.sample_size = v;
        }
        if let Some(v) = self.fast_path {
            params.fast_path = v;
        }
        if let Some(v) = self.eigen_ratio_thresh {
            params.eigen_ratio_thresh = v;
        }
        if let Some(v) = self.min_vp_scale {
            params.min_vp_scale = v;
        }
        if let Some(v) = self.histogram_bins {
            params.histogram_bins = v;
        }
        if let Some(v) = self.max_iterations {
            params.max_iterations = v;
        }
        if let Some(v) = self.triad_tolerance {
            params.triad_tolerance = v;
        }
        params.seed = self.seed;
        if let Some(solver) = &self.solver {
            params.solver = solver.clone();
        }
        params
    }
}

#[derive(Debug, Deserialize)]
pub struct DemoOutputConfig {
    pub dir: PathBuf,
    /// Also write `<stem>.overlay.png` per input.
    #[serde(default)]
    pub overlay: bool,
}

impl DemoOutputConfig {
    pub fn result_path(&self, input: &Path) -> PathBuf {
        self.dir.join(format!("{}.result.json", file_stem(input)))
    }

    pub fn overlay_path(&self, input: &Path) -> PathBuf {
        self.dir.join(format!("{}.overlay.png", file_stem(input)))
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "lines".to_string())
}

pub fn load_config(path: &Path) -> Result<VpDemoConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let cfg: VpDemoConfig =
            serde_json::from_str(r#"{ "inputs": ["a/b.json"], "output": { "dir": "out" } }"#)
                .unwrap();
        let params = cfg.resolve_pipeline_params();
        assert_eq!(params.min_lines, 10);
        assert_eq!(params.search.sample_size, 4);
        assert!(params.search.fast_path);
        assert!(!cfg.output.overlay);
        assert_eq!(
            cfg.output.result_path(Path::new("a/b.json")),
            PathBuf::from("out/b.result.json")
        );
        let size = ImageSize {
            width: 640,
            height: 480,
        };
        assert!(cfg.camera.resolve(size).unwrap().is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let json = r#"{
            "inputs": [],
            "camera": { "focal_px": 700.0 },
            "lines": { "min_length": 12.5, "use_uncertainty": false },
            "search": {
                "inlier_cos_thresh": 0.05,
                "seed": 9,
                "solver": { "primary": { "max_iterations": 100 }, "fallback": null }
            },
            "output": { "dir": "out", "overlay": true }
        }"#;
        let cfg: VpDemoConfig = serde_json::from_str(json).unwrap();
        let params = cfg.resolve_pipeline_params();
        assert_eq!(params.min_line_length, 12.5);
        assert!(!params.use_uncertainty);
        assert_eq!(params.search.inlier_cos_thresh, 0.05);
        assert_eq!(params.search.seed, Some(9));
        assert_eq!(params.search.solver.primary.max_iterations, 100);
        assert_eq!(params.search.solver.primary.rho, 1.0);
        assert!(params.search.solver.fallback.is_none());

        let size = ImageSize {
            width: 640,
            height: 480,
        };
        let k = cfg.camera.resolve(size).unwrap().unwrap();
        assert_eq!(k.matrix()[(0, 2)], 320.0);
        assert_eq!(k.matrix()[(1, 1)], 700.0);
    }
}
