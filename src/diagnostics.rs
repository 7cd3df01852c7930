//! Counters and timings collected while the VP search runs.
//!
//! Sample-level rejections never surface as errors; they are tallied here so
//! that a failed search can still be explained after the fact.

use serde::Serialize;

/// Per-run trace of the VP search state machine.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTrace {
    /// Outer iterations consumed (1-based count of the last one executed).
    pub iterations: usize,
    pub samples_drawn: usize,
    /// Samples drawn from the dominant direction cluster.
    pub seeded_samples: usize,
    pub solver_failures: usize,
    pub rank_rejections: usize,
    /// VP blocks whose leading singular value fell below `min_vp_scale`.
    pub scale_rejections: usize,
    /// Samples whose marked inliers could not be refit to one direction.
    pub polish_rejections: usize,
    pub orthogonality_resets: usize,
    /// Resets triggered by the active pool dropping below three lines.
    pub pool_resets: usize,
    pub triad_resets: usize,
    /// Third VPs replaced by the cross product of the first two.
    pub triad_snaps: usize,
    pub accepted_vps: usize,
    /// Size of the dominant direction cluster (0 with the fast path off).
    pub cluster_size: usize,
    pub elapsed_ms: f64,
}

impl SearchTrace {
    pub fn rejected_samples(&self) -> usize {
        self.solver_failures
            + self.rank_rejections
            + self.scale_rejections
            + self.polish_rejections
            + self.orthogonality_resets
    }

    pub fn print_text_summary(&self) {
        println!("VP search trace");
        println!("  iterations: {}", self.iterations);
        println!(
            "  samples: {} (seeded {}, cluster size {})",
            self.samples_drawn, self.seeded_samples, self.cluster_size
        );
        println!(
            "  rejections: solver={} rank={} scale={} refit={} orthogonality={}",
            self.solver_failures,
            self.rank_rejections,
            self.scale_rejections,
            self.polish_rejections,
            self.orthogonality_resets
        );
        println!(
            "  resets: pool={} triad={} (snapped third VP {}x)",
            self.pool_resets, self.triad_resets, self.triad_snaps
        );
        println!("  accepted VPs: {}", self.accepted_vps);
        println!("  elapsed_ms: {:.3}", self.elapsed_ms);
    }
}
