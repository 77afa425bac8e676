//! wise-schemas
//!
//! Shared in-memory model: rules, rulesets, commands, voteorders and the
//! desired/observed rule state maps.
//!
//! Wire shapes are NOT defined here; `wise-protocol` owns every encoding.
//! Values are immutable snapshots once built: nothing in the workspace
//! mutates a decoded command.

mod commands;
mod post;
mod rules;
mod state;

pub use commands::*;
pub use post::PostMetadata;
pub use rules::*;
pub use state::{ConfigError, DesiredState, ObservedState};
