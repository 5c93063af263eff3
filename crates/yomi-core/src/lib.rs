//! # Yomi Core
//!
//! Learns per-character reading distributions for kanji from `(word, reading)`
//! pairs. Each tuple becomes a factor over the characters of its word; each
//! character is a node whose belief over readings is refined by loopy belief
//! propagation, and factor/partition weights are re-learned after every trial.
//!
//! ```rust,ignore
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//! use yomi_core::{parse_tuples, train, LearnerConfig};
//!
//! let corpus = parse_tuples("火 ひ\n火山 かざん\n")?;
//! let mut rng = ChaCha20Rng::seed_from_u64(42);
//! let (model, _) = train(&corpus, LearnerConfig::default(), &mut rng)?;
//! assert!(model.prob('火', "ひ").is_some());
//! ```

#![forbid(unsafe_code)]

pub mod corpus;
pub mod engine;
pub mod evaluation;
pub mod segment;

// Re-export commonly used types
pub use corpus::{clean_tuple, parse_tuples, prepare_corpus, Tuple};
pub use engine::distribution::{Distribution, Reading, WEIGHT_CEILING};
pub use engine::errors::YomiError;
pub use engine::factor::{Factor, FactorId};
pub use engine::inference::{infer_factor, FirstInQueue, InferenceDiagnostics, SelectionOrder};
pub use engine::learner::{train, LearnerConfig, TrialProgress, TrialSummary};
pub use engine::model::Model;
pub use engine::node::{Node, NodeArena, NodeId};
pub use engine::report::{AlphaEntry, FactorReport, NodeReport, PartitionReport};
pub use evaluation::{parse_test_cases, Evaluation, TestCase, TestStatistics};
pub use segment::{omega_heuristics, partition, Partition, Segment};
