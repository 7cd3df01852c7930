//! Host-facing entry points.
//!
//! [`VpEstimator`] filters raw segments, prepares the calibrated geometry and
//! runs the search. [`process_lines`] wraps it so that nothing escapes to the
//! host: input errors and panics become [`VpReport::Error`], an exhausted
//! search becomes [`VpReport::Failed`].

use crate::error::VpError;
use crate::geometry::{Intrinsics, LineGeometry};
use crate::report::VpReport;
use crate::sdp::{ConvexSolver, SolverChain};
use crate::search::{SearchOutcome, SearchParams, VpSearch};
use crate::types::{ImageSize, Line2D};
use log::{debug, warn};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

#[derive(Clone, Debug)]
pub struct PipelineParams {
    /// Segments shorter than this (pixels) are dropped before the search.
    pub min_line_length: f64,
    /// Fewer surviving segments is a fatal input error.
    pub min_lines: usize,
    /// Weight lines by propagated endpoint noise; otherwise all weights are 1.
    pub use_uncertainty: bool,
    pub search: SearchParams,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            min_line_length: 30.0,
            min_lines: 10,
            use_uncertainty: true,
            search: SearchParams::default(),
        }
    }
}

/// Everything produced by one estimation.
#[derive(Clone, Debug)]
pub struct VpEstimate {
    /// Segments that survived the length filter, in input order.
    pub lines: Vec<Line2D>,
    pub intrinsics: Intrinsics,
    pub outcome: SearchOutcome,
    pub latency_ms: f64,
}

impl VpEstimate {
    pub fn is_success(&self) -> bool {
        self.outcome.is_done()
    }
}

pub struct VpEstimator<S: ConvexSolver = SolverChain> {
    params: PipelineParams,
    search: VpSearch<S>,
}

impl VpEstimator<SolverChain> {
    pub fn new(params: PipelineParams) -> Result<Self, VpError> {
        let search = VpSearch::new(params.search.clone())?;
        Ok(Self { params, search })
    }
}

impl<S: ConvexSolver> VpEstimator<S> {
    pub fn with_solver(params: PipelineParams, solver: S) -> Result<Self, VpError> {
        let search = VpSearch::with_solver(params.search.clone(), solver)?;
        Ok(Self { params, search })
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Estimate three orthogonal VPs. Intrinsics are guessed from
    /// `image_size` when not supplied.
    pub fn estimate(
        &mut self,
        lines: &[Line2D],
        image_size: ImageSize,
        intrinsics: Option<Intrinsics>,
    ) -> Result<VpEstimate, VpError> {
        let t0 = Instant::now();
        let kept = filter_short_lines(lines, self.params.min_line_length);
        debug!(
            "Pipeline: kept {} / {} segments (min length {:.1} px)",
            kept.len(),
            lines.len(),
            self.params.min_line_length
        );
        if kept.len() < self.params.min_lines {
            return Err(VpError::TooFewLines {
                found: kept.len(),
                minimum: self.params.min_lines,
            });
        }

        let intrinsics = match intrinsics {
            Some(k) => k,
            None => Intrinsics::guess(image_size)?,
        };
        let geometry = LineGeometry::compute(&kept, &intrinsics, self.params.use_uncertainty)?;
        let outcome = self
            .search
            .run(&kept, &geometry.normals, &geometry.uncertainty)?;
        Ok(VpEstimate {
            lines: kept,
            intrinsics,
            outcome,
            latency_ms: t0.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

fn filter_short_lines(lines: &[Line2D], min_length: f64) -> Vec<Line2D> {
    lines
        .iter()
        .copied()
        .filter(|l| l.length() >= min_length)
        .collect()
}

/// Never-failing entry: every outcome, including panics, becomes a report.
pub fn process_lines(
    lines: &[Line2D],
    image_size: ImageSize,
    intrinsics: Option<Intrinsics>,
    params: &PipelineParams,
) -> VpReport {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut estimator = VpEstimator::new(params.clone())?;
        estimator.estimate(lines, image_size, intrinsics)
    }));
    match result {
        Ok(Ok(estimate)) => VpReport::from_estimate(&estimate),
        Ok(Err(err)) => {
            warn!("Pipeline: {err}");
            VpReport::error(err.to_string())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("Pipeline: internal error: {message}");
            VpReport::error(format!("internal error: {message}"))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_are_dropped_before_counting() {
        let lines = vec![
            Line2D::new(0.0, 0.0, 10.0, 0.0),
            Line2D::new(0.0, 0.0, 40.0, 0.0),
            Line2D::new(0.0, 0.0, 0.0, 29.9),
        ];
        assert_eq!(filter_short_lines(&lines, 30.0), vec![lines[1]]);

        let mut estimator = VpEstimator::new(PipelineParams::default()).unwrap();
        let size = ImageSize {
            width: 640,
            height: 480,
        };
        match estimator.estimate(&lines, size, None) {
            Err(VpError::TooFewLines { found, minimum }) => {
                assert_eq!(found, 1);
                assert_eq!(minimum, 10);
            }
            other => panic!("expected TooFewLines, got {other:?}"),
        }
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload = panic::catch_unwind(|| panic!("bad {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "bad 7");
        let payload = panic::catch_unwind(|| panic!("plain")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "plain");
    }
}
