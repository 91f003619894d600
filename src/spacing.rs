//! Chrome-aware spacing compensation for the overview's preview grid.
//!
//! Window previews carry decoration chrome (close button, title overlay)
//! that sticks out past their content bounds. Without compensation, adjacent
//! previews can visually overlap. The policy here widens both grid axes by
//! the largest chrome inset so no edge can collide, whichever edge carries
//! the decoration.

use std::rc::Rc;

use tracing::warn;

use crate::common::geometry::Rect;
use crate::host::{ArrangementSource, HostCall, HostReply, OverviewItem};
use crate::registry::Method;

/// Computes the compensated spacing for one layout pass.
///
/// All overlays in a single arrangement share the same chrome sizes, so the
/// first item in the engine's sort order stands in for all of them. A `None`
/// spacing means no spacing was requested on that axis and stays `None`.
/// The container box passes through untouched; it is part of the signature
/// because this is a drop-in replacement for the host's richer spacing
/// method.
pub fn adjust_spacing(
    row_spacing: Option<f64>,
    col_spacing: Option<f64>,
    container: Rect,
    items: &[Rc<dyn OverviewItem>],
) -> (Option<f64>, Option<f64>, Rect) {
    let Some(first) = items.first() else {
        return (row_spacing, col_spacing, container);
    };

    let (top, bottom) = first.chrome_heights();
    let (left, right) = first.chrome_widths();
    let oversize = top.max(bottom).max(left).max(right);

    (
        row_spacing.map(|spacing| spacing + oversize),
        col_spacing.map(|spacing| spacing + oversize),
        container,
    )
}

/// Builds the method that replaces the arrangement engine's spacing slot,
/// reading the current item set from `arrangement` on every layout pass.
pub fn layout_override(arrangement: Rc<dyn ArrangementSource>) -> Method {
    Rc::new(move |args| match args {
        HostCall::AdjustSpacing { row_spacing, col_spacing, container } => {
            let (row_spacing, col_spacing, container) =
                adjust_spacing(row_spacing, col_spacing, container, &arrangement.sorted_items());
            HostReply::Spacing { row_spacing, col_spacing, container }
        }
        other => {
            warn!(?other, "spacing override dispatched with unexpected call");
            HostReply::Unit
        }
    })
}
