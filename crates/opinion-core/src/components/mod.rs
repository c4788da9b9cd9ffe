//! ECS Components
//!
//! Agent components and the belief space shared by all agents of a run.

pub mod agent;
pub mod belief;

pub use agent::*;
pub use belief::*;
