//! Shared foundational types used across the Ferrite simulation kernel.
//!
//! This crate provides the 4-state logic value domain, packed logic vectors
//! with 4-state arithmetic, and clock-rate values.

#![warn(missing_docs)]

pub mod frequency;
pub mod logic;
pub mod logic_vec;

pub use frequency::Frequency;
pub use logic::Logic;
pub use logic_vec::LogicVec;
