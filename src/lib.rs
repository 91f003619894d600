//! Overview tweaks for a compositor host: a continuous, dimming background
//! behind the window picker and chrome-aware spacing for the preview grid,
//! injected into the host's live dispatch through a reversible
//! method-override registry.
//!
//! The embedder builds an [`host::OverviewHost`] from its own services and
//! drives everything through [`overview::OverviewTweaks::enable`] and
//! [`overview::OverviewTweaks::disable`].

pub mod background;
pub mod common;
pub mod host;
pub mod overview;
pub mod registry;
pub mod spacing;

pub use background::BackgroundController;
pub use common::config::Settings;
pub use host::OverviewHost;
pub use overview::OverviewTweaks;
pub use registry::{OverrideError, OverrideRegistry, OverrideSet};
