//! Randomization assignment tables for clinical trial design, and the
//! tutorial report that explains them.
//!
//! Three techniques are covered:
//!   - simple randomization  (independent weighted coin flips)
//!   - block randomization   (fixed-composition blocks, exact balance)
//!   - stratified blocks     (block randomization per stratum)
//!
//! RULE: All randomness flows through an RngBank seeded from a single
//! master seed. Nothing here touches a platform RNG.

pub mod block;
pub mod config;
pub mod error;
pub mod export;
pub mod generator;
pub mod narrative;
pub mod report;
pub mod rng;
pub mod simple;
pub mod table;
pub mod types;
