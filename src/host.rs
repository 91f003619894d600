//! Interfaces onto the compositor host.
//!
//! Everything the tweaks core needs from its environment comes through the
//! traits here: output enumeration, the overview transition progress, the
//! background actor factory, and the arrangement engine's view of the window
//! previews. The host side owns all rendering and input; we only read state
//! and push visual parameters back.

pub mod signal;

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::common::geometry::Rect;
use crate::host::signal::SubscriptionId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct OutputId(u32);

impl OutputId {
    pub fn new(id: u32) -> OutputId { OutputId(id) }

    pub fn get(&self) -> u32 { self.0 }
}

/// A virtual call on one of the host's method tables.
///
/// The host dispatches overview-related methods through this uniform surface
/// so that implementations are swappable at runtime (see
/// [`crate::registry`]). Payloads carry the original arguments of the call.
#[derive(Clone, Debug, PartialEq)]
pub enum HostCall {
    /// The arrangement engine asks for spacing compensation before laying
    /// out window previews. A `None` spacing means no spacing was requested
    /// on that axis.
    AdjustSpacing {
        row_spacing: Option<f64>,
        col_spacing: Option<f64>,
        container: Rect,
    },
    /// A workspace container is being constructed for the given output.
    InitWorkspace { output: OutputId },
}

#[derive(Clone, Debug, PartialEq)]
pub enum HostReply {
    Unit,
    Spacing {
        row_spacing: Option<f64>,
        col_spacing: Option<f64>,
        container: Rect,
    },
}

/// Enumeration of the physical outputs plus the topology-changed
/// notification that fires when outputs are added, removed, or resized.
pub trait OutputTopology {
    fn outputs(&self) -> Vec<OutputId>;
    fn connect_changed(&self, callback: Box<dyn Fn()>) -> SubscriptionId;
    fn disconnect_changed(&self, id: SubscriptionId);
}

/// The overview transition progress: 0 at rest, 1 when the overview is fully
/// shown, and possibly beyond 1 while overshooting. Read-only from our side.
pub trait ProgressSource {
    fn value(&self) -> f64;
    fn connect_changed(&self, callback: Box<dyn Fn(f64)>) -> SubscriptionId;
    fn disconnect_changed(&self, id: SubscriptionId);
}

/// Creates per-output background actors anchored into the overview's
/// background container.
pub trait BackgroundFactory {
    fn create_layer(&self, output: OutputId, vignette: bool) -> Rc<dyn BackgroundActor>;
}

/// One background actor owned by us for the lifetime of a layer. The host
/// provides no drop-based teardown; `destroy` must be called explicitly.
pub trait BackgroundActor {
    fn set_brightness(&self, value: f64);
    fn set_vignette_sharpness(&self, value: f64);
    fn destroy(&self);
}

/// Overview chrome whose properties the entry/exit animation drives. Used
/// only to force rest values when the tweaks are disabled mid-transition.
pub trait OverviewControls {
    fn set_dash_offset(&self, x: f64);
    fn set_search_entry_opacity(&self, opacity: u8);
    fn set_thumbnail_box_offset(&self, x: f64);
}

/// The arrangement engine's current, already-sorted set of window previews.
pub trait ArrangementSource {
    fn sorted_items(&self) -> Vec<Rc<dyn OverviewItem>>;
}

/// One arranged window preview. Chrome queries report the decoration size
/// the item's overlay contributes beyond its content bounds, per edge.
pub trait OverviewItem {
    /// (top, bottom) chrome insets.
    fn chrome_heights(&self) -> (f64, f64);
    /// (left, right) chrome insets.
    fn chrome_widths(&self) -> (f64, f64);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerStyle {
    /// The stock container: workspace backgrounds scale with the transition.
    Fixed,
    /// The adaptive variant: only the window picker scales, the background
    /// stays put behind it.
    Scaling,
}

/// Constructs workspace containers on behalf of the (possibly overridden)
/// workspace init method.
pub trait WorkspaceHost {
    fn build_container(&self, output: OutputId, style: ContainerStyle);
}

/// The process-wide context object bundling every host collaborator, created
/// by the embedder and handed to [`crate::overview::OverviewTweaks`]. This
/// replaces any global cross-cutting registry: it is created before
/// `enable()` and dropped after `disable()`, never implicitly recreated.
#[derive(Clone)]
pub struct OverviewHost {
    pub outputs: Rc<dyn OutputTopology>,
    pub backgrounds: Rc<dyn BackgroundFactory>,
    pub progress: Rc<dyn ProgressSource>,
    pub controls: Rc<dyn OverviewControls>,
    pub arrangement: Rc<dyn ArrangementSource>,
    pub workspaces: Rc<dyn WorkspaceHost>,
    /// Method table of the arrangement engine (spacing lives here).
    pub layout_table: crate::registry::MethodTableHandle,
    /// Method table of the workspace container (init lives here).
    pub workspace_table: crate::registry::MethodTableHandle,
}
