//! VP search orchestrator.
//!
//! A bounded RANSAC-style loop over SDP relaxations. Each outer iteration
//! draws a small sample of active lines, solves the relaxation for a single
//! VP, validates it, and on acceptance removes its inliers from the pool.
//! Three accepted VPs are projected onto the nearest rotation.
//!
//! Transitions per iteration
//! - fewer than three active lines: full reset;
//! - solver failure, rank-check failure, a VP block spread over several
//!   directions, or inliers that cannot be refit: resample, state untouched;
//! - second VP not orthogonal to the first: full reset;
//! - third VP: snapped to `v1 × v2` when not already orthogonal;
//! - triad not orthonormal: full reset.
//!
//! Fast path: VP1 is sampled from the dominant direction cluster when it has
//! enough active lines, and after VP1 the pool is replaced by the supporters
//! of the best peak interval before VP1's own inliers are removed.
//!
//! All mutable state lives in a [`SearchState`] local to one run; randomness
//! comes from an injectable `Rng`.

mod params;
mod sampling;
mod state;

pub use params::{SearchParams, VANISHING_POINT_COUNT};
pub use sampling::{draw_sample, Sample, SampleSource};
pub use state::{Correspondence, LinePool, SearchState, SearchStatus};

use crate::diagnostics::SearchTrace;
use crate::error::VpError;
use crate::histogram::dominant_direction_cluster;
use crate::peaks::find_peak_interval;
use crate::recover::{
    check_rank, complete_triad, enforce_rotation, is_orthogonal_to, polish_vp, recover_vp,
};
use crate::sdp::{build_vp_problem, ConvexSolver, SolverChain, SolverError, Variable};
use crate::types::Line2D;
use log::{debug, info};
use nalgebra::{Matrix3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::Instant;

/// Minimum active lines for a meaningful sample.
const MIN_ACTIVE_LINES: usize = 3;

/// Three mutually orthogonal unit VPs with their inlier sets.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VpTriad {
    /// Right-handed rotation; row `k` is VP `k`.
    pub rotation: Matrix3<f64>,
    pub vps: [Vector3<f64>; VANISHING_POINT_COUNT],
    pub correspondences: Vec<Correspondence>,
}

impl VpTriad {
    fn from_rotation(rotation: Matrix3<f64>, correspondences: Vec<Correspondence>) -> Self {
        let vps = [
            rotation.row(0).transpose(),
            rotation.row(1).transpose(),
            rotation.row(2).transpose(),
        ];
        Self {
            rotation,
            vps,
            correspondences,
        }
    }

    /// VP index per line, `None` for lines no VP claimed.
    pub fn associations(&self, num_lines: usize) -> Vec<Option<usize>> {
        let mut out = vec![None; num_lines];
        for (k, corr) in self.correspondences.iter().enumerate() {
            for &line in &corr.inliers {
                if let Some(slot) = out.get_mut(line) {
                    slot.get_or_insert(k);
                }
            }
        }
        out
    }
}

/// Terminal result of one search.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub status: SearchStatus,
    pub solution: Option<VpTriad>,
    pub trace: SearchTrace,
}

impl SearchOutcome {
    pub fn is_done(&self) -> bool {
        self.status == SearchStatus::Done
    }
}

/// Orchestrator bound to a solver backend.
#[derive(Debug)]
pub struct VpSearch<S: ConvexSolver = SolverChain> {
    params: SearchParams,
    solver: S,
}

impl VpSearch<SolverChain> {
    /// Search with the default solver chain built from `params.solver`.
    pub fn new(params: SearchParams) -> Result<Self, VpError> {
        let solver = SolverChain::from_params(&params.solver);
        Self::with_solver(params, solver)
    }
}

impl<S: ConvexSolver> VpSearch<S> {
    pub fn with_solver(params: SearchParams, solver: S) -> Result<Self, VpError> {
        params.validate()?;
        Ok(Self { params, solver })
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    /// Run with an RNG seeded from `params.seed` (or the thread RNG).
    pub fn run(
        &mut self,
        lines: &[Line2D],
        normals: &[Vector3<f64>],
        weights: &[f64],
    ) -> Result<SearchOutcome, VpError> {
        let mut rng = match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        self.run_with_rng(lines, normals, weights, &mut rng)
    }

    /// Run the state machine with the given random source.
    ///
    /// `lines`, `normals` and `weights` must be index-aligned. Only input
    /// misalignment is an error; an exhausted budget is a `Failed` outcome.
    pub fn run_with_rng<R: Rng + ?Sized>(
        &mut self,
        lines: &[Line2D],
        normals: &[Vector3<f64>],
        weights: &[f64],
        rng: &mut R,
    ) -> Result<SearchOutcome, VpError> {
        if lines.len() != normals.len() || normals.len() != weights.len() {
            return Err(VpError::MisalignedInput {
                lines: lines.len(),
                normals: normals.len(),
                weights: weights.len(),
            });
        }
        let t0 = Instant::now();
        let params = self.params.clone();
        let c = params.inlier_cos_thresh;
        let mut trace = SearchTrace::default();

        let cluster = if params.fast_path {
            dominant_direction_cluster(lines, params.histogram_bins)
        } else {
            Vec::new()
        };
        trace.cluster_size = cluster.len();

        let mut state = SearchState::new(normals.len());
        for iteration in 1..=params.max_iterations {
            trace.iterations = iteration;

            // With three VPs accepted the iteration has already returned or
            // reset, so a short pool always means starting over.
            if state.pool.active_count() < MIN_ACTIVE_LINES {
                debug!(
                    "Search[{iteration}]: {} active lines left, resetting",
                    state.pool.active_count()
                );
                trace.pool_resets += 1;
                state.reset();
                if state.pool.active_count() < MIN_ACTIVE_LINES {
                    continue;
                }
            }

            let seeded = params.fast_path && state.vps.is_empty();
            let sample = draw_sample(
                rng,
                &state.pool,
                seeded.then_some(cluster.as_slice()),
                params.sample_size,
            );
            trace.samples_drawn += 1;
            if sample.source == SampleSource::Cluster {
                trace.seeded_samples += 1;
            }

            let sampled_normals: Vec<Vector3<f64>> =
                sample.ids.iter().map(|&i| normals[i]).collect();
            let sampled_weights: Vec<f64> = sample.ids.iter().map(|&i| weights[i]).collect();
            let problem = build_vp_problem(&sampled_normals, &sampled_weights, c);

            let solution = match self.solver.solve(&problem) {
                Ok(solution) if solution.status.is_acceptable() => solution,
                Ok(solution) => {
                    let err = SolverError::Unsolved {
                        solver: self.solver.name().to_string(),
                        status: solution.status,
                    };
                    debug!("Search[{iteration}]: {err}, resampling");
                    trace.solver_failures += 1;
                    continue;
                }
                Err(err) => {
                    debug!("Search[{iteration}]: {err}, resampling");
                    trace.solver_failures += 1;
                    continue;
                }
            };

            let rank = check_rank(&solution, params.eigen_ratio_thresh);
            if !rank.passed {
                debug!(
                    "Search[{iteration}]: rank check failed (ratios {:.3} / {:.3})",
                    rank.inlier_ratio, rank.outlier_ratio
                );
                trace.rank_rejections += 1;
                continue;
            }
            let Some(recovered) = recover_vp(&solution.vp_block(Variable::Inlier)) else {
                debug!("Search[{iteration}]: VP block vanished, resampling");
                trace.rank_rejections += 1;
                continue;
            };
            if recovered.scale < params.min_vp_scale {
                debug!(
                    "Search[{iteration}]: VP block spread over several directions (scale {:.3}), resampling",
                    recovered.scale
                );
                trace.scale_rejections += 1;
                continue;
            }
            let Some(mut vp) = polish_vp(
                &solution,
                &sampled_normals,
                &sampled_weights,
                &recovered.direction,
            ) else {
                debug!("Search[{iteration}]: marked inliers do not pin a direction, resampling");
                trace.polish_rejections += 1;
                continue;
            };

            match state.vps.len() {
                1 => {
                    if !is_orthogonal_to(&vp, &state.vps[0], c) {
                        debug!(
                            "Search[{iteration}]: VP2 not orthogonal to VP1 (|dot| {:.4}), resetting",
                            vp.dot(&state.vps[0]).abs()
                        );
                        trace.orthogonality_resets += 1;
                        state.reset();
                        continue;
                    }
                }
                2 => {
                    let (snapped, replaced) = complete_triad(&state.vps[0], &state.vps[1], &vp);
                    if replaced {
                        trace.triad_snaps += 1;
                    }
                    vp = snapped;
                }
                _ => {}
            }

            let inliers: Vec<usize> = state
                .pool
                .active_ids()
                .iter()
                .copied()
                .filter(|&i| normals[i].dot(&vp).abs() < c)
                .collect();
            if params.fast_path && state.vps.is_empty() {
                let peak = find_peak_interval(&vp, normals);
                state.pool.replace_with(&peak.support);
            }
            debug!(
                "Search[{iteration}]: accepted VP{} [{:.4}, {:.4}, {:.4}] (scale {:.3}) with {} inliers",
                state.vps.len() + 1,
                vp[0],
                vp[1],
                vp[2],
                recovered.scale,
                inliers.len()
            );
            state.accept(vp, inliers);
            trace.accepted_vps += 1;

            if state.vps.len() == VANISHING_POINT_COUNT {
                let stacked = [state.vps[0], state.vps[1], state.vps[2]];
                match enforce_rotation(&stacked, params.triad_tolerance) {
                    Some(rotation) => {
                        state.status = SearchStatus::Done;
                        trace.elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
                        info!(
                            "Search: found orthogonal triad after {} iterations ({:.1} ms)",
                            iteration, trace.elapsed_ms
                        );
                        let triad = VpTriad::from_rotation(
                            rotation,
                            std::mem::take(&mut state.correspondences),
                        );
                        return Ok(SearchOutcome {
                            status: state.status,
                            solution: Some(triad),
                            trace,
                        });
                    }
                    None => {
                        debug!("Search[{iteration}]: triad not orthonormal, resetting");
                        trace.triad_resets += 1;
                        state.reset();
                    }
                }
            }
        }

        state.status = SearchStatus::Failed;
        trace.elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
        info!(
            "Search: no orthogonal triad within {} iterations ({} samples rejected)",
            params.max_iterations,
            trace.rejected_samples()
        );
        Ok(SearchOutcome {
            status: state.status,
            solution: None,
            trace,
        })
    }
}
