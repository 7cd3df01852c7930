//! JSON payload handed back to the host.

use crate::diagnostics::SearchTrace;
use crate::pipeline::VpEstimate;
use crate::types::{ImagePoint, Line2D};
use serde::Serialize;

/// Result of one invocation, tagged by `status`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VpReport {
    #[serde(rename_all = "camelCase")]
    Success {
        /// Segments the search ran on (after length filtering).
        lines: Vec<Line2D>,
        /// Unit VP directions in the camera frame.
        vps_3d: Vec<[f64; 3]>,
        vps_2d: Vec<ImagePoint>,
        /// VP index per line, `null` when unassigned.
        associations: Vec<Option<usize>>,
        iterations: usize,
        latency_ms: f64,
        trace: SearchTrace,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        iterations: usize,
        latency_ms: f64,
        trace: SearchTrace,
    },
    Error {
        message: String,
    },
}

impl VpReport {
    pub fn error(message: impl Into<String>) -> Self {
        VpReport::Error {
            message: message.into(),
        }
    }

    pub fn from_estimate(estimate: &VpEstimate) -> Self {
        let outcome = &estimate.outcome;
        let trace = outcome.trace.clone();
        let Some(triad) = outcome.solution.as_ref().filter(|_| outcome.is_done()) else {
            return VpReport::Failed {
                iterations: trace.iterations,
                latency_ms: estimate.latency_ms,
                trace,
            };
        };
        let vps_3d = triad.vps.iter().map(|v| [v[0], v[1], v[2]]).collect();
        let vps_2d = triad
            .vps
            .iter()
            .map(|v| estimate.intrinsics.project_direction(v))
            .collect();
        VpReport::Success {
            lines: estimate.lines.clone(),
            vps_3d,
            vps_2d,
            associations: triad.associations(estimate.lines.len()),
            iterations: trace.iterations,
            latency_ms: estimate.latency_ms,
            trace,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, VpReport::Success { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            VpReport::Success { .. } => "success",
            VpReport::Failed { .. } => "failed",
            VpReport::Error { .. } => "error",
        }
    }

    pub fn print_text_summary(&self) {
        match self {
            VpReport::Success {
                lines,
                vps_3d,
                vps_2d,
                associations,
                latency_ms,
                trace,
                ..
            } => {
                println!("VP estimation: success ({} lines)", lines.len());
                for (k, (v, p)) in vps_3d.iter().zip(vps_2d).enumerate() {
                    let support = associations.iter().filter(|a| **a == Some(k)).count();
                    let image = match p {
                        ImagePoint::Finite([x, y]) => format!("({x:.1}, {y:.1})"),
                        ImagePoint::Infinity => "at infinity".to_string(),
                    };
                    println!(
                        "  VP{}: [{:.4}, {:.4}, {:.4}] image {} support {}",
                        k + 1,
                        v[0],
                        v[1],
                        v[2],
                        image,
                        support
                    );
                }
                println!("  latency_ms: {latency_ms:.3}");
                trace.print_text_summary();
            }
            VpReport::Failed {
                latency_ms, trace, ..
            } => {
                println!("VP estimation: failed");
                println!("  latency_ms: {latency_ms:.3}");
                trace.print_text_summary();
            }
            VpReport::Error { message } => println!("VP estimation: error: {message}"),
        }
    }
}
