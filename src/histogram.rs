//! Direction histogram used to seed the first VP hypothesis.
//!
//! Segments are binned by their pixel-space orientation (see
//! [`segment_orientation`]) into `H` equal bins over (0, π]. Exactly vertical
//! segments sit at π and fall in the last bin, `H-1`. The bin with
//! the most segments is the "dominant direction cluster"; sampling the first
//! hypothesis from it tends to draw lines of a single family. The cluster is
//! a bias only: callers fall back to uniform sampling when it is too small.

use crate::angle::segment_orientation;
use crate::types::Line2D;
use log::debug;
use std::f64::consts::PI;

pub const DEFAULT_HISTOGRAM_BINS: usize = 100;

/// Line-count histogram over orientation that remembers bin membership.
#[derive(Clone, Debug)]
pub struct DirectionHistogram {
    counts: Vec<usize>,
    members: Vec<Vec<usize>>,
    bin_width: f64,
}

impl DirectionHistogram {
    pub fn new(num_bins: usize) -> Self {
        assert!(num_bins > 0, "direction histogram requires at least one bin");
        DirectionHistogram {
            counts: vec![0; num_bins],
            members: vec![Vec::new(); num_bins],
            bin_width: PI / num_bins as f64,
        }
    }

    /// Bin every segment of `lines`, keyed by its index in the slice.
    pub fn from_lines(lines: &[Line2D], num_bins: usize) -> Self {
        let mut hist = Self::new(num_bins);
        for (i, line) in lines.iter().enumerate() {
            hist.accumulate(i, segment_orientation(line.dx(), line.dy()));
        }
        hist
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn members(&self, bin: usize) -> &[usize] {
        &self.members[bin]
    }

    /// Ceiling division by the bin width, clamped to `[0, H-1]`.
    ///
    /// Values at or below 0 share bin 0 with the first width. π lands in the
    /// last bin.
    pub fn bin_index(&self, orientation: f64) -> usize {
        let n = self.counts.len();
        if !orientation.is_finite() {
            return 0;
        }
        let raw = (orientation / self.bin_width).ceil();
        let one_based = if raw < 1.0 {
            1
        } else if raw > n as f64 {
            n
        } else {
            raw as usize
        };
        one_based - 1
    }

    pub fn accumulate(&mut self, line_index: usize, orientation: f64) {
        let bin = self.bin_index(orientation);
        self.counts[bin] += 1;
        self.members[bin].push(line_index);
    }

    /// Highest-count bin; ties resolve to the lowest index.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, &count) in self.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            match best {
                Some(b) if self.counts[b] >= count => {}
                _ => best = Some(i),
            }
        }
        best
    }

    /// Line indices of the highest-count bin (empty when nothing was binned).
    pub fn dominant_cluster(&self) -> Vec<usize> {
        self.argmax()
            .map(|b| self.members[b].clone())
            .unwrap_or_default()
    }
}

/// Convenience wrapper: bin `lines` into `num_bins` and return the dominant
/// cluster's global indices.
pub fn dominant_direction_cluster(lines: &[Line2D], num_bins: usize) -> Vec<usize> {
    let hist = DirectionHistogram::from_lines(lines, num_bins);
    let cluster = hist.dominant_cluster();
    if let Some(bin) = hist.argmax() {
        debug!(
            "Histogram: dominant bin {} of {} holds {} / {} lines",
            bin,
            num_bins,
            cluster.len(),
            lines.len()
        );
    }
    cluster
}
