//! The learning engine.
//!
//! This module provides:
//! - **errors**: error type shared by the crate
//! - **distribution**: sparse reading distributions and weight rescaling
//! - **node** / **factor**: the per-character and per-tuple halves of the factor graph
//! - **model**: the registry owning every node and factor
//! - **inference**: queue-based belief propagation for one factor
//! - **learner**: trial driver and omega/alpha parameter learning
//! - **report**: read-only snapshots for result reporting

pub mod distribution;
pub mod errors;
pub mod factor;
pub mod inference;
pub mod learner;
pub mod model;
pub mod node;
pub mod report;
