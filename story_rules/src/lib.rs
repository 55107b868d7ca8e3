//! # Story Rules
//!
//! The static half of the progression engine: event graph definitions, guard
//! conditions, narrative effects and the power catalog. Nothing in this crate
//! holds session state; `progression_core` owns everything that changes while
//! a game is played.

pub mod conditions;
pub mod dataset;
pub mod events;
pub mod powers;

pub use conditions::*;
pub use dataset::*;
pub use events::*;
pub use powers::*;
