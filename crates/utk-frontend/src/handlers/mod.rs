// SPDX-License-Identifier: MIT OR Apache-2.0
//! Handler families of the frontend api surface.

mod cleaner;
mod component_ops;
mod driver_ops;
mod finders;
mod on_builders;
mod pointer_matrix;
mod window_ops;

use crate::objects::ApiContext;
use crate::observer::{UiEventForwarder, register_observer_methods};
use crate::server::FrontendApiServer;
use std::sync::Arc;
use utk_driver::{Point, UNASSIGNED_DISPLAY};
use utk_error::{ApiError, ErrCode};

/// Register every handler family on the server.
pub fn register_all(
    server: &mut FrontendApiServer,
    ctx: &Arc<ApiContext>,
    forwarder: &Arc<UiEventForwarder>,
) {
    on_builders::register(server, ctx);
    finders::register(server, ctx);
    driver_ops::register(server, ctx);
    component_ops::register(server, ctx);
    window_ops::register(server, ctx);
    pointer_matrix::register(server, ctx);
    cleaner::register(server, ctx);
    register_observer_methods(server, ctx, forwarder);
}

/// Reject points lying outside their display.
pub(crate) fn validate_point(ctx: &ApiContext, point: Point) -> Result<(), ApiError> {
    let size = ctx.driver.display_size(point.display_id)?;
    if point.x < 0 || point.x > size.x || point.y < 0 || point.y > size.y {
        return Err(ApiError::with_message(
            ErrCode::InvalidInput,
            format!("Coordinate out of range: ({}, {})", point.x, point.y),
        ));
    }
    Ok(())
}

/// Normalize the second point of a two-point gesture onto the first one's
/// display, rejecting explicit cross-display pairs.
pub(crate) fn align_displays(from: Point, mut to: Point) -> Result<(Point, Point), ApiError> {
    if to.display_id == UNASSIGNED_DISPLAY {
        to.display_id = from.display_id;
    }
    if from.display_id != to.display_id {
        return Err(ApiError::with_message(
            ErrCode::InvalidInput,
            "The start point and end point must be on the same display",
        ));
    }
    Ok((from, to))
}
