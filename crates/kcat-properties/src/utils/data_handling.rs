use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::error::DatasetError;

/// Seed of the one-off shuffle performed before splitting.
pub const DEFAULT_SPLIT_SEED: u64 = 233;
pub const DEFAULT_TRAIN_RATIO: f64 = 0.8;
pub const DEFAULT_DEV_RATIO: f64 = 0.5;

/// One enzyme-substrate pair with its measured turnover number.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    /// Atom identifiers, one per atom, indexing the fingerprint vocabulary.
    pub fingerprints: Vec<u32>,
    /// `(num_atoms, num_atoms)` connectivity weights.
    pub adjacency: Array2<f32>,
    /// `(seq_len, feature_width)` local protein representation.
    pub protein: Array2<f32>,
    pub kcat: f32,
}

impl Example {
    pub fn num_atoms(&self) -> usize {
        self.fingerprints.len()
    }

    fn validate(&self, example: usize, vocab_size: usize) -> Result<(), DatasetError> {
        if self.fingerprints.is_empty() {
            return Err(DatasetError::EmptyFingerprint { example });
        }
        if let Some(&index) = self
            .fingerprints
            .iter()
            .find(|&&i| i as usize >= vocab_size)
        {
            return Err(DatasetError::FingerprintOutOfRange {
                example,
                index,
                vocab_size,
            });
        }
        let atoms = self.num_atoms();
        if self.adjacency.dim() != (atoms, atoms) {
            return Err(DatasetError::AdjacencyShape {
                example,
                atoms,
                shape: self.adjacency.dim(),
            });
        }
        Ok(())
    }
}

/// Builds a dense matrix from row vectors, rejecting ragged input.
pub fn rows_to_array2(rows: Vec<Vec<f32>>) -> Result<Array2<f32>, DatasetError> {
    let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut matrix = Array2::zeros((rows.len(), n_cols));
    for (row, values) in rows.iter().enumerate() {
        if values.len() != n_cols {
            return Err(DatasetError::RaggedMatrix {
                row,
                expected: n_cols,
                found: values.len(),
            });
        }
        matrix.row_mut(row).assign(&ArrayView1::from(values.as_slice()));
    }
    Ok(matrix)
}

/// Splits `items` at `floor(ratio * len)`.
pub fn split_dataset<T>(mut items: Vec<T>, ratio: f64) -> (Vec<T>, Vec<T>) {
    let n = ((ratio * items.len() as f64) as usize).min(items.len());
    let tail = items.split_off(n);
    (items, tail)
}

/// Train / dev / test partitions of a dataset.
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: Vec<Example>,
    pub dev: Vec<Example>,
    pub test: Vec<Example>,
}

/// Aligned examples plus the vocabulary they index into.
#[derive(Debug, Clone)]
pub struct KcatDataset {
    examples: Vec<Example>,
    vocab_size: usize,
}

impl KcatDataset {
    /// Zips the four per-example collections into examples.
    ///
    /// Fails if the collections differ in length, if any example is internally
    /// inconsistent, or if the protein representations do not all share one shape.
    pub fn from_collections(
        fingerprints: Vec<Vec<u32>>,
        adjacencies: Vec<Array2<f32>>,
        proteins: Vec<Array2<f32>>,
        kcats: Vec<f32>,
        vocab_size: usize,
    ) -> Result<Self, DatasetError> {
        let n = fingerprints.len();
        if adjacencies.len() != n || proteins.len() != n || kcats.len() != n {
            return Err(DatasetError::LengthMismatch {
                fingerprints: n,
                adjacencies: adjacencies.len(),
                proteins: proteins.len(),
                kcats: kcats.len(),
            });
        }

        let examples: Vec<Example> = fingerprints
            .into_par_iter()
            .zip(adjacencies)
            .zip(proteins)
            .zip(kcats)
            .enumerate()
            .map(|(i, (((fingerprints, adjacency), protein), kcat))| {
                let example = Example {
                    fingerprints,
                    adjacency,
                    protein,
                    kcat,
                };
                example.validate(i, vocab_size)?;
                Ok(example)
            })
            .collect::<Result<Vec<_>, DatasetError>>()?;

        if let Some(first) = examples.first() {
            let expected = first.protein.dim();
            if let Some((i, ex)) = examples
                .iter()
                .enumerate()
                .find(|(_, ex)| ex.protein.dim() != expected)
            {
                return Err(DatasetError::ProteinShape {
                    example: i,
                    expected,
                    found: ex.protein.dim(),
                });
            }
        }

        log::debug!(
            "Assembled {} examples over a vocabulary of {} fingerprints",
            examples.len(),
            vocab_size
        );

        Ok(Self {
            examples,
            vocab_size,
        })
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn into_examples(self) -> Vec<Example> {
        self.examples
    }

    /// Shape shared by every protein representation, if there is any example.
    pub fn protein_shape(&self) -> Option<(usize, usize)> {
        self.examples.first().map(|ex| ex.protein.dim())
    }

    /// Shuffles once with `seed`, then slices the train partition at
    /// `train_ratio` and splits the remainder into dev/test at `dev_ratio`.
    pub fn split(self, seed: u64, train_ratio: f64, dev_ratio: f64) -> DatasetSplit {
        let mut examples = self.examples;
        let mut rng = StdRng::seed_from_u64(seed);
        examples.shuffle(&mut rng);

        let (train, rest) = split_dataset(examples, train_ratio);
        let (dev, test) = split_dataset(rest, dev_ratio);
        log::info!(
            "Split dataset into {} train, {} dev and {} test examples",
            train.len(),
            dev.len(),
            test.len()
        );
        DatasetSplit { train, dev, test }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn collections(n: usize) -> (Vec<Vec<u32>>, Vec<Array2<f32>>, Vec<Array2<f32>>, Vec<f32>) {
        let fingerprints = (0..n).map(|i| vec![0, (i % 3) as u32, 1]).collect();
        let adjacencies = (0..n).map(|_| Array2::eye(3)).collect();
        let proteins = (0..n).map(|_| Array2::zeros((16, 26))).collect();
        let kcats = (0..n).map(|i| i as f32).collect();
        (fingerprints, adjacencies, proteins, kcats)
    }

    #[test]
    fn test_split_dataset_floors() {
        let (a, b) = split_dataset((0..10).collect::<Vec<_>>(), 0.8);
        assert_eq!(a, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(b, vec![8, 9]);

        let (a, b) = split_dataset(vec![1, 2, 3], 0.5);
        assert_eq!(a, vec![1]);
        assert_eq!(b, vec![2, 3]);
    }

    #[test]
    fn test_length_mismatch_is_reported() {
        let (fps, adjs, proteins, mut kcats) = collections(4);
        kcats.pop();
        let err = KcatDataset::from_collections(fps, adjs, proteins, kcats, 5).unwrap_err();
        assert_eq!(
            err,
            DatasetError::LengthMismatch {
                fingerprints: 4,
                adjacencies: 4,
                proteins: 4,
                kcats: 3
            }
        );
    }

    #[test]
    fn test_out_of_range_fingerprint_is_rejected() {
        let (mut fps, adjs, proteins, kcats) = collections(4);
        fps[2][1] = 5;
        let err = KcatDataset::from_collections(fps, adjs, proteins, kcats, 5).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::FingerprintOutOfRange { example: 2, index: 5, .. }
        ));
    }

    #[test]
    fn test_adjacency_must_match_atom_count() {
        let (fps, mut adjs, proteins, kcats) = collections(3);
        adjs[1] = Array2::eye(2);
        let err = KcatDataset::from_collections(fps, adjs, proteins, kcats, 5).unwrap_err();
        assert!(matches!(err, DatasetError::AdjacencyShape { example: 1, atoms: 3, .. }));
    }

    #[test]
    fn test_protein_shapes_must_agree() {
        let (fps, adjs, mut proteins, kcats) = collections(3);
        proteins[2] = Array2::zeros((16, 25));
        let err = KcatDataset::from_collections(fps, adjs, proteins, kcats, 5).unwrap_err();
        assert!(matches!(err, DatasetError::ProteinShape { example: 2, .. }));
    }

    #[test]
    fn test_rows_to_array2_rejects_ragged_rows() {
        let ok = rows_to_array2(vec![vec![1., 0.], vec![0., 1.]]).unwrap();
        assert_eq!(ok.dim(), (2, 2));
        let err = rows_to_array2(vec![vec![1., 0.], vec![0.]]).unwrap_err();
        assert!(matches!(err, DatasetError::RaggedMatrix { row: 1, .. }));
    }

    #[test]
    fn test_split_is_deterministic_and_disjoint() {
        let build = || {
            let (fps, adjs, proteins, kcats) = collections(50);
            KcatDataset::from_collections(fps, adjs, proteins, kcats, 5).unwrap()
        };
        let first = build().split(DEFAULT_SPLIT_SEED, DEFAULT_TRAIN_RATIO, DEFAULT_DEV_RATIO);
        let second = build().split(DEFAULT_SPLIT_SEED, DEFAULT_TRAIN_RATIO, DEFAULT_DEV_RATIO);

        assert_eq!(first.train, second.train);
        assert_eq!(first.dev, second.dev);
        assert_eq!(first.test, second.test);
        assert_eq!((first.train.len(), first.dev.len(), first.test.len()), (40, 5, 5));

        // kcat doubles as a unique id in this fixture.
        let mut ids: Vec<i64> = first
            .train
            .iter()
            .chain(&first.dev)
            .chain(&first.test)
            .map(|ex| ex.kcat as i64)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..50).collect::<Vec<_>>());
    }
}
