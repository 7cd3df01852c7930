use super::state::LinePool;
use rand::prelude::IndexedRandom;
use rand::Rng;

/// Where a sample came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleSource {
    /// Dominant direction cluster intersected with the active pool.
    Cluster,
    /// Uniform over the active pool.
    Uniform,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    /// Global line ids, distinct.
    pub ids: Vec<usize>,
    pub source: SampleSource,
}

/// Draw up to `size` distinct active lines without replacement.
///
/// With a `cluster`, the active members of the cluster are used when there
/// are at least `size` of them; otherwise sampling falls back to the whole
/// pool. Uniform samples shrink to the pool size when the pool is smaller.
pub fn draw_sample<R: Rng + ?Sized>(
    rng: &mut R,
    pool: &LinePool,
    cluster: Option<&[usize]>,
    size: usize,
) -> Sample {
    if let Some(cluster) = cluster {
        let candidates: Vec<usize> = cluster
            .iter()
            .copied()
            .filter(|&i| pool.is_active(i))
            .collect();
        if candidates.len() >= size {
            return Sample {
                ids: candidates.choose_multiple(rng, size).copied().collect(),
                source: SampleSource::Cluster,
            };
        }
    }
    let amount = size.min(pool.active_count());
    Sample {
        ids: pool
            .active_ids()
            .choose_multiple(rng, amount)
            .copied()
            .collect(),
        source: SampleSource::Uniform,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn cluster_sample_stays_inside_active_cluster() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pool = LinePool::full(20);
        pool.deactivate(&[2]);
        let cluster = [1, 2, 3, 5, 8, 13];
        for _ in 0..50 {
            let s = draw_sample(&mut rng, &pool, Some(&cluster), 4);
            assert_eq!(s.source, SampleSource::Cluster);
            assert_eq!(s.ids.len(), 4);
            for id in &s.ids {
                assert!(cluster.contains(id) && *id != 2);
            }
            let mut sorted = s.ids.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), 4);
        }
    }

    #[test]
    fn small_cluster_falls_back_to_uniform() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pool = LinePool::full(10);
        pool.deactivate(&[3, 4]);
        let s = draw_sample(&mut rng, &pool, Some(&[3, 4, 5]), 2);
        assert_eq!(s.source, SampleSource::Uniform);
        assert!(s.ids.iter().all(|&i| pool.is_active(i)));
    }

    #[test]
    fn uniform_sample_shrinks_to_pool() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut pool = LinePool::full(8);
        pool.replace_with(&[1, 6, 7]);
        let mut s = draw_sample(&mut rng, &pool, None, 5);
        s.ids.sort_unstable();
        assert_eq!(s.ids, vec![1, 6, 7]);
    }

    #[test]
    fn same_seed_same_sample() {
        let pool = LinePool::full(30);
        let a = draw_sample(&mut StdRng::seed_from_u64(11), &pool, None, 5);
        let b = draw_sample(&mut StdRng::seed_from_u64(11), &pool, None, 5);
        assert_eq!(a, b);
    }
}
