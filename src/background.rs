//! Keeps a continuous background behind the overview's window picker.
//!
//! The stock overview lets workspace backgrounds scale away with the
//! transition. This controller instead owns one full-size background layer
//! per output, anchored into the overview's background container, and keeps
//! its brightness and vignette a pure function of the transition progress:
//! brightness eases from 1.0 down to the configured dim floor as progress
//! runs 0..1 (clamped beyond), and the vignette is flattened throughout.

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::common::config::Settings;
use crate::common::geometry::lerp;
use crate::host::signal::SubscriptionId;
use crate::host::{BackgroundActor, BackgroundFactory, OutputId, OutputTopology, ProgressSource};

struct Layer {
    output: OutputId,
    actor: Rc<dyn BackgroundActor>,
    progress_sub: SubscriptionId,
}

struct Inner {
    outputs: Rc<dyn OutputTopology>,
    backgrounds: Rc<dyn BackgroundFactory>,
    progress: Rc<dyn ProgressSource>,
    dim_brightness: f64,
    vignette_sharpness: f64,
    layers: Vec<Layer>,
    topology_sub: Option<SubscriptionId>,
    active: bool,
}

pub struct BackgroundController {
    inner: Rc<RefCell<Inner>>,
}

impl BackgroundController {
    pub fn new(
        outputs: Rc<dyn OutputTopology>,
        backgrounds: Rc<dyn BackgroundFactory>,
        progress: Rc<dyn ProgressSource>,
        settings: &Settings,
    ) -> BackgroundController {
        BackgroundController {
            inner: Rc::new(RefCell::new(Inner {
                outputs,
                backgrounds,
                progress,
                dim_brightness: settings.dim_brightness,
                vignette_sharpness: settings.vignette_sharpness,
                layers: Vec::new(),
                topology_sub: None,
                active: false,
            })),
        }
    }

    pub fn is_active(&self) -> bool { self.inner.borrow().active }

    pub fn layer_count(&self) -> usize { self.inner.borrow().layers.len() }

    /// Builds one layer per output and starts tracking progress and topology
    /// changes. No-op while already active.
    pub fn activate(&self) {
        if self.inner.borrow().active {
            trace!("background controller already active");
            return;
        }

        Self::rebuild(&self.inner);

        let sub = {
            let outputs = self.inner.borrow().outputs.clone();
            let weak = Rc::downgrade(&self.inner);
            outputs.connect_changed(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    debug!("output topology changed; rebuilding background layers");
                    BackgroundController::rebuild(&inner);
                }
            }))
        };

        let mut inner = self.inner.borrow_mut();
        inner.topology_sub = Some(sub);
        inner.active = true;
        debug!(layers = inner.layers.len(), "background controller activated");
    }

    /// Tears every layer down and stops tracking. No-op while inactive.
    ///
    /// Subscriptions are released before any actor is destroyed so that a
    /// notification already in flight can never reach a dead layer.
    pub fn deactivate(&self) {
        let (topology_sub, layers, outputs, progress) = {
            let mut inner = self.inner.borrow_mut();
            if !inner.active {
                trace!("background controller already inactive");
                return;
            }
            inner.active = false;
            (
                inner.topology_sub.take(),
                mem::take(&mut inner.layers),
                inner.outputs.clone(),
                inner.progress.clone(),
            )
        };

        if let Some(sub) = topology_sub {
            outputs.disconnect_changed(sub);
        }
        for layer in layers {
            progress.disconnect_changed(layer.progress_sub);
            layer.actor.destroy();
        }
        debug!("background controller deactivated");
    }

    /// Destroys the current layer set and recreates one layer per output.
    /// Topology changes are rare and layer counts small, so a full rebuild
    /// is preferred over incremental diffing of the output set.
    fn rebuild(inner: &Rc<RefCell<Inner>>) {
        let (outputs, backgrounds, progress, dim, sharpness) = {
            let inner = inner.borrow();
            (
                inner.outputs.clone(),
                inner.backgrounds.clone(),
                inner.progress.clone(),
                inner.dim_brightness,
                inner.vignette_sharpness,
            )
        };

        let stale = {
            let mut inner = inner.borrow_mut();
            mem::take(&mut inner.layers)
        };
        for layer in stale {
            trace!(output = ?layer.output, "destroying background layer");
            progress.disconnect_changed(layer.progress_sub);
            layer.actor.destroy();
        }

        let fresh: Vec<Layer> = outputs
            .outputs()
            .into_iter()
            .map(|output| {
                trace!(?output, "creating background layer");
                Self::build_layer(&backgrounds, &progress, output, dim, sharpness)
            })
            .collect();
        inner.borrow_mut().layers = fresh;
    }

    fn build_layer(
        backgrounds: &Rc<dyn BackgroundFactory>,
        progress: &Rc<dyn ProgressSource>,
        output: OutputId,
        dim: f64,
        sharpness: f64,
    ) -> Layer {
        let actor = backgrounds.create_layer(output, true);

        let progress_sub = {
            let actor = actor.clone();
            progress.connect_changed(Box::new(move |value| {
                apply(&*actor, value, dim, sharpness);
            }))
        };

        // A freshly built layer must reflect the current transition state
        // immediately, not wait for the next progress notification.
        apply(&*actor, progress.value(), dim, sharpness);

        Layer { output, actor, progress_sub }
    }
}

fn apply(actor: &dyn BackgroundActor, progress: f64, dim: f64, sharpness: f64) {
    actor.set_vignette_sharpness(sharpness);
    actor.set_brightness(lerp(1.0, dim, progress.min(1.0)));
}
