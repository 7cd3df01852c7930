use nalgebra::Vector3;
use serde::Serialize;

/// Active-line mask plus the ascending list of active global ids.
///
/// `reverse[k]` is the global index of the `k`-th active line. Samples are
/// drawn from this list, so they always carry global ids.
#[derive(Clone, Debug, PartialEq)]
pub struct LinePool {
    active: Vec<bool>,
    reverse: Vec<usize>,
}

impl LinePool {
    pub fn full(num_lines: usize) -> Self {
        Self {
            active: vec![true; num_lines],
            reverse: (0..num_lines).collect(),
        }
    }

    pub fn total(&self) -> usize {
        self.active.len()
    }

    pub fn active_count(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_active(&self, global: usize) -> bool {
        self.active.get(global).copied().unwrap_or(false)
    }

    pub fn active_ids(&self) -> &[usize] {
        &self.reverse
    }

    /// Drop `ids` from the pool. Out-of-range ids are ignored.
    pub fn deactivate(&mut self, ids: &[usize]) {
        for &i in ids {
            if let Some(flag) = self.active.get_mut(i) {
                *flag = false;
            }
        }
        self.rebuild();
    }

    /// Make exactly `ids` active.
    pub fn replace_with(&mut self, ids: &[usize]) {
        self.active.iter_mut().for_each(|f| *f = false);
        for &i in ids {
            if let Some(flag) = self.active.get_mut(i) {
                *flag = true;
            }
        }
        self.rebuild();
    }

    pub fn reactivate_all(&mut self) {
        self.active.iter_mut().for_each(|f| *f = true);
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.reverse = self
            .active
            .iter()
            .enumerate()
            .filter_map(|(i, &on)| on.then_some(i))
            .collect();
    }
}

/// Inliers (global ids, ascending) recorded when a VP was accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Correspondence {
    pub inliers: Vec<usize>,
}

impl Correspondence {
    pub fn contains(&self, line: usize) -> bool {
        self.inliers.binary_search(&line).is_ok()
    }

    pub fn len(&self) -> usize {
        self.inliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inliers.is_empty()
    }
}

/// State machine position of one search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    /// Zero, one or two VPs accepted.
    Searching,
    /// Three orthonormal VPs accepted.
    Done,
    /// Iteration budget exhausted.
    Failed,
}

/// Everything one search mutates, owned by the orchestrator.
#[derive(Clone, Debug)]
pub struct SearchState {
    pub status: SearchStatus,
    pub pool: LinePool,
    pub vps: Vec<Vector3<f64>>,
    pub correspondences: Vec<Correspondence>,
}

impl SearchState {
    pub fn new(num_lines: usize) -> Self {
        Self {
            status: SearchStatus::Searching,
            pool: LinePool::full(num_lines),
            vps: Vec::new(),
            correspondences: Vec::new(),
        }
    }

    /// Forget accepted VPs and reactivate every line.
    pub fn reset(&mut self) {
        self.status = SearchStatus::Searching;
        self.pool.reactivate_all();
        self.vps.clear();
        self.correspondences.clear();
    }

    pub fn accept(&mut self, vp: Vector3<f64>, inliers: Vec<usize>) {
        self.pool.deactivate(&inliers);
        self.vps.push(vp);
        self.correspondences.push(Correspondence { inliers });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_map_tracks_active_lines() {
        let mut pool = LinePool::full(6);
        pool.deactivate(&[1, 4, 42]);
        assert_eq!(pool.active_ids(), &[0, 2, 3, 5]);
        assert!(!pool.is_active(4));
        assert!(!pool.is_active(42));
        assert_eq!(pool.total(), 6);

        pool.replace_with(&[5, 1]);
        assert_eq!(pool.active_ids(), &[1, 5]);
        pool.reactivate_all();
        assert_eq!(pool.active_count(), 6);
    }

    #[test]
    fn reset_clears_accepted_vps() {
        let mut state = SearchState::new(5);
        state.accept(Vector3::z(), vec![0, 3]);
        assert_eq!(state.pool.active_ids(), &[1, 2, 4]);
        assert!(state.correspondences[0].contains(3));
        assert!(!state.correspondences[0].contains(1));
        state.reset();
        assert!(state.vps.is_empty());
        assert!(state.correspondences.is_empty());
        assert_eq!(state.pool, LinePool::full(5));
        assert_eq!(state.status, SearchStatus::Searching);
    }
}
