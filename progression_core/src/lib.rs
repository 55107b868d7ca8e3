//! # Progression Core
//!
//! The live half of the progression engine. This crate owns the session
//! state built on top of `story_rules` definitions: which events completed,
//! which flags are set, which powers are unlocked and cooling down, and the
//! save slots that capture all of it.
//!
//! ## Core Components
//!
//! - **story**: Event graph traversal, story flags and checkpoint tracking
//! - **powers**: Power catalog runtime state and the cooldown state machine
//! - **persistence**: Manual and rotating auto save slots over a pluggable store
//! - **session**: The session-scoped context wiring the components together
//!
//! ## Design Philosophy
//!
//! - **Explicit ownership**: One `GameSession` owns every piece of mutable state;
//!   collaborators receive references, never look each other up
//! - **Results, not panics**: Every failure is a returned value; the session never aborts
//! - **Copy before write**: Saves capture an owned snapshot before touching storage

pub mod clock;
pub mod config;
pub mod persistence;
pub mod powers;
pub mod session;
pub mod story;

pub use clock::*;
pub use config::*;
pub use persistence::*;
pub use powers::*;
pub use session::*;
pub use story::*;
