//! Composes the overview tweaks under a single `enable()` / `disable()`.
//!
//! Three features hang off the entry points: the spacing override on the
//! arrangement engine (always installed as the base layer), the static
//! background controller, and the scaling workspace container. The latter
//! two carry their own enabled flags so enable and disable stay idempotent
//! per feature, and disable tears down in strict reverse order of enable.

use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::background::BackgroundController;
use crate::common::config::Settings;
use crate::host::{ContainerStyle, HostCall, HostReply, OverviewHost};
use crate::registry::{Method, OverrideError, OverrideRegistry, OverrideSet};
use crate::spacing;

/// Spacing slot on the arrangement engine's method table.
pub const SPACING_SYMBOL: &str = "adjust_spacing_and_padding";
/// Construction slot on the workspace container's method table.
pub const WORKSPACE_INIT_SYMBOL: &str = "init";

pub struct OverviewTweaks {
    host: OverviewHost,
    settings: Settings,
    registry: OverrideRegistry,
    background: BackgroundController,
    layout_set: Option<OverrideSet>,
    workspace_set: Option<OverrideSet>,
    static_background: bool,
    scaling_workspace_container: bool,
}

impl OverviewTweaks {
    pub fn new(host: OverviewHost, settings: Settings) -> OverviewTweaks {
        let background = BackgroundController::new(
            host.outputs.clone(),
            host.backgrounds.clone(),
            host.progress.clone(),
            &settings,
        );
        OverviewTweaks {
            host,
            settings,
            registry: OverrideRegistry::new(),
            background,
            layout_set: None,
            workspace_set: None,
            static_background: false,
            scaling_workspace_container: false,
        }
    }

    pub fn background(&self) -> &BackgroundController { &self.background }

    /// Turns the tweaks on: the spacing override first, then the background
    /// controller, then the scaling container override.
    ///
    /// `enable()` must alternate with [`disable`](Self::disable); calling it
    /// twice in a row trips the double-install check on the base spacing
    /// override. A failure part way through may leave a subset of features
    /// active; `disable()` restores a clean baseline either way.
    pub fn enable(&mut self) -> Result<(), OverrideError> {
        info!("enabling overview tweaks");

        let overrides = vec![(
            SPACING_SYMBOL.to_string(),
            spacing::layout_override(self.host.arrangement.clone()),
        )];
        self.layout_set = Some(self.registry.install(&self.host.layout_table, overrides)?);

        if self.settings.static_background && !self.static_background {
            self.background.activate();
            self.static_background = true;
        }

        if self.settings.scaling_workspace_container && !self.scaling_workspace_container {
            let overrides = vec![(WORKSPACE_INIT_SYMBOL.to_string(), self.scaling_init())];
            self.workspace_set =
                Some(self.registry.install(&self.host.workspace_table, overrides)?);
            self.scaling_workspace_container = true;
        }

        Ok(())
    }

    /// Turns everything off, in strict reverse order of `enable()`. Safe to
    /// call with any subset of features active, including none.
    pub fn disable(&mut self) {
        if self.static_background {
            self.background.deactivate();
            self.static_background = false;
        }

        if self.scaling_workspace_container {
            if let Some(set) = self.workspace_set.take() {
                self.registry.uninstall(set);
            }
            self.scaling_workspace_container = false;

            // The overview entry/exit animation may have been cut off mid
            // transition; the restored methods would have kept driving these
            // toward their rest values, so force them there now.
            self.host.controls.set_dash_offset(0.0);
            self.host.controls.set_search_entry_opacity(255);
            self.host.controls.set_thumbnail_box_offset(0.0);
        }

        if let Some(set) = self.layout_set.take() {
            self.registry.uninstall(set);
            info!("disabled overview tweaks");
        } else {
            debug!("disable with no active overrides; nothing to do");
        }
    }

    /// The replacement for the workspace container's construction method:
    /// build the container in scaling style, so the background stays put
    /// while the window picker scales with the transition.
    fn scaling_init(&self) -> Method {
        let workspaces = self.host.workspaces.clone();
        Rc::new(move |args| match args {
            HostCall::InitWorkspace { output } => {
                workspaces.build_container(output, ContainerStyle::Scaling);
                HostReply::Unit
            }
            other => {
                warn!(?other, "workspace init override dispatched with unexpected call");
                HostReply::Unit
            }
        })
    }
}
