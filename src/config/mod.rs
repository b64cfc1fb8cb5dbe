//! # Settings
//!
//! Optional `settings.kdl` controlling timeouts, colour, prompts and which
//! managers the registry offers. See [`settings::Settings`] for the nodes.

pub mod settings;

pub use settings::{COLOR_POLICIES, Settings};
