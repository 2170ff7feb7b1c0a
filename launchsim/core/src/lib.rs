//! # Launchsim
//!
//! Launchsim verifies that requests submitted to a chain launch coordinated on a ledger yield a
//! genesis the chain actually boots from. The `launchsim-core` crate provides the request
//! reducer, the genesis builder and the launch simulator, along with the abstractions over the
//! ledger and the node software they rely on. Refer to the `launchsim` crate for the executable
//! binary.

/// Coin amounts in the chain's `100stake,5token` notation.
pub mod coin;

/// Node peers and their connection kinds.
pub mod peer;

/// Address prefix conversion.
pub mod address;

/// Gentx parsing.
pub mod gentx;

/// Requests submitted to a launch and their static validation.
pub mod request;

/// The genesis information of a launch and the reducer folding requests into it.
pub mod genesis_information;

/// Ledger abstraction and built-in implementations.
pub mod ledger;

/// Chain runtime abstraction and built-in implementations.
pub mod runtime;

/// Genesis file editing.
pub mod genesis;

/// Node configuration file editing.
pub mod config;

/// Genesis construction from a genesis information.
pub mod builder;

/// Boot checks of a prepared chain.
pub mod simulator;

/// End to end request verification.
pub mod verifier;

mod errors;
pub use errors::{ConflictError, Error, VerificationError};

/// Internal utilities.
mod utils;

#[cfg(test)]
mod testing;
