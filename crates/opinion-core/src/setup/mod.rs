//! Run Setup
//!
//! Network generation and population spawning.

pub mod network;
pub mod population;

pub use network::*;
pub use population::*;
