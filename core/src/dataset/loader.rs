use crate::dataset::intracranial::{ImageRecord, IntracranialDataset};
use crate::error::{IchError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Splits a dataset into batches and decodes each batch on a worker pool
///
/// Sample order within a batch is preserved regardless of which worker
/// finishes first. Any sample error fails the whole batch.
pub struct BatchLoader<'a> {
    dataset: &'a IntracranialDataset,
    batch_size: usize,
    order: Vec<usize>,
    seed: u64,
    pool: ThreadPool,
}

impl<'a> BatchLoader<'a> {
    /// Sequential loader over the full dataset
    pub fn new(dataset: &'a IntracranialDataset, batch_size: usize, num_workers: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(IchError::ConfigError("batch_size must be positive".into()));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("ich-loader-{}", i))
            .build()
            .map_err(|e| IchError::PipelineError(format!("Failed to start loader pool: {}", e)))?;

        Ok(Self {
            dataset,
            batch_size,
            order: (0..dataset.len()).collect(),
            seed: 0,
            pool,
        })
    }

    /// Builder: Permute the sample order with a seeded generator
    ///
    /// The seed also drives per-sample augmentation, so the same seed
    /// reproduces the same epoch.
    pub fn shuffled(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.order.shuffle(&mut rng);
        self.seed = seed;
        self
    }

    /// Builder: Seed augmentation without changing order
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }

    /// Dataset indices in visiting order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Lazily decodes batches in order
    pub fn batches(&self) -> impl Iterator<Item = Result<Vec<ImageRecord>>> + '_ {
        self.order
            .chunks(self.batch_size)
            .enumerate()
            .map(move |(b, chunk)| self.load(b * self.batch_size, chunk))
    }

    fn load(&self, offset: usize, indices: &[usize]) -> Result<Vec<ImageRecord>> {
        let dataset = self.dataset;
        let seed = self.seed;
        self.pool.install(|| {
            indices
                .par_iter()
                .enumerate()
                .map(|(i, &index)| {
                    let mut rng = sample_rng(seed, offset + i);
                    dataset.get_with_rng(index, &mut rng)
                })
                .collect()
        })
    }
}

fn sample_rng(seed: u64, position: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (position as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::intracranial::testing::{table, write_png};
    use tempfile::TempDir;

    fn dataset(dir: &TempDir, n: usize) -> IntracranialDataset {
        let ids: Vec<String> = (0..n).map(|i| format!("ID_{}", i)).collect();
        for (i, id) in ids.iter().enumerate() {
            write_png(dir.path(), id, 2, i as u8);
        }
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        IntracranialDataset::new(table(&refs), dir.path(), true)
    }

    #[test]
    fn test_sequential_batches_keep_order() {
        let dir = TempDir::new().unwrap();
        let dataset = dataset(&dir, 5);
        let loader = BatchLoader::new(&dataset, 2, 3).unwrap();
        assert_eq!(loader.num_batches(), 3);

        let batches: Vec<Vec<ImageRecord>> = loader.batches().map(|b| b.unwrap()).collect();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);

        let ids: Vec<String> = batches
            .into_iter()
            .flatten()
            .map(|r| r.requested_id)
            .collect();
        assert_eq!(ids, vec!["ID_0", "ID_1", "ID_2", "ID_3", "ID_4"]);
    }

    #[test]
    fn test_shuffle_is_seeded_permutation() {
        let dir = TempDir::new().unwrap();
        let dataset = dataset(&dir, 20);

        let a = BatchLoader::new(&dataset, 4, 2).unwrap().shuffled(42);
        let b = BatchLoader::new(&dataset, 4, 2).unwrap().shuffled(42);
        let c = BatchLoader::new(&dataset, 4, 2).unwrap().shuffled(43);
        assert_eq!(a.order(), b.order());
        assert_ne!(a.order(), c.order());

        let mut sorted = a.order().to_vec();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_sample_error_fails_batch() {
        let dir = TempDir::new().unwrap();
        let mut ids: Vec<String> = (0..3).map(|i| format!("ID_{}", i)).collect();
        for id in &ids {
            write_png(dir.path(), id, 2, 0);
        }
        // Trailing row without a file has nothing to fall forward to
        ids.push("ID_missing".into());
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let dataset = IntracranialDataset::new(table(&refs), dir.path(), true);

        let loader = BatchLoader::new(&dataset, 2, 2).unwrap();
        let results: Vec<_> = loader.batches().collect();
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(IchError::DatasetExhausted { requested: 3, .. })
        ));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let dir = TempDir::new().unwrap();
        let dataset = dataset(&dir, 1);
        assert!(matches!(
            BatchLoader::new(&dataset, 0, 1),
            Err(IchError::ConfigError(_))
        ));
    }
}
