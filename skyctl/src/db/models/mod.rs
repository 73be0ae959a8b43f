//! Storage record models matching table schemas.
//!
//! Models are distinct from the API models in [`crate::api::models`] so storage and wire
//! representations can evolve independently.
//!
//! - [`accounts`]: Credit-holding accounts
//! - [`credits`]: Ledger transactions (purchases and refunds) and credit outcomes
//! - [`jobs`]: Enhancement jobs and their status machine
//! - [`variations`]: Candidate outputs of a job and the upscaled artifacts made from them

pub mod accounts;
pub mod credits;
pub mod jobs;
pub mod variations;
