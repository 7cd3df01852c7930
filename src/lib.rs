#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod error;
pub mod pipeline;
pub mod report;
pub mod types;

// Building blocks of the search; public for tools and tests.
pub mod angle;
pub mod diagnostics;
pub mod geometry;
pub mod histogram;
pub mod peaks;
pub mod recover;
pub mod sdp;
pub mod search;

// Demo support.
pub mod config;
pub mod io;

// --- High-level re-exports -------------------------------------------------

pub use crate::error::VpError;
pub use crate::geometry::{Intrinsics, LineGeometry};
pub use crate::pipeline::{process_lines, PipelineParams, VpEstimate, VpEstimator};
pub use crate::report::VpReport;
pub use crate::search::{SearchOutcome, SearchParams, SearchStatus, VpSearch, VpTriad};
pub use crate::types::{ImagePoint, ImageSize, Line2D};

// Diagnostics returned with every search.
pub use crate::diagnostics::SearchTrace;

// Solver seam for custom backends.
pub use crate::sdp::{ConvexSolver, SdpProblem, SdpSolution, SolveStatus, SolverError};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use ortho_vp::prelude::*;
///
/// let lines: Vec<Line2D> = Vec::new();
/// let size = ImageSize { width: 640, height: 480 };
/// let report = process_lines(&lines, size, None, &PipelineParams::default());
/// println!("status={}", report.status());
/// ```
pub mod prelude {
    pub use crate::{
        process_lines, ImageSize, Intrinsics, Line2D, PipelineParams, SearchParams, VpEstimator,
        VpReport,
    };
}
