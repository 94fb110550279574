use std::error::Error;
use std::fmt;

/// Validation failures raised while assembling a dataset from extracted features.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// The per-example collections do not line up.
    LengthMismatch {
        fingerprints: usize,
        adjacencies: usize,
        proteins: usize,
        kcats: usize,
    },
    EmptyFingerprint { example: usize },
    FingerprintOutOfRange {
        example: usize,
        index: u32,
        vocab_size: usize,
    },
    AdjacencyShape {
        example: usize,
        atoms: usize,
        shape: (usize, usize),
    },
    ProteinShape {
        example: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },
    RaggedMatrix { row: usize, expected: usize, found: usize },
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DatasetError::LengthMismatch {
                fingerprints,
                adjacencies,
                proteins,
                kcats,
            } => write!(
                f,
                "The lengths of compound fingerprints ({}), adjacencies ({}), proteins ({}) and kcats ({}) are not equal",
                fingerprints, adjacencies, proteins, kcats
            ),
            DatasetError::EmptyFingerprint { example } => {
                write!(f, "Example {} has no atoms", example)
            }
            DatasetError::FingerprintOutOfRange {
                example,
                index,
                vocab_size,
            } => write!(
                f,
                "Example {} uses fingerprint index {} outside of the vocabulary (size {})",
                example, index, vocab_size
            ),
            DatasetError::AdjacencyShape {
                example,
                atoms,
                shape,
            } => write!(
                f,
                "Example {} has {} atoms but an adjacency matrix of shape {:?}",
                example, atoms, shape
            ),
            DatasetError::ProteinShape {
                example,
                expected,
                found,
            } => write!(
                f,
                "Example {} has a protein representation of shape {:?}, expected {:?}",
                example, found, expected
            ),
            DatasetError::RaggedMatrix {
                row,
                expected,
                found,
            } => write!(
                f,
                "Row {} has {} columns, expected {}",
                row, found, expected
            ),
        }
    }
}

impl Error for DatasetError {}
