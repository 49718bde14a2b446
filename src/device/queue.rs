//! Streaming choreography shared by the blend and scale passes.
//!
//! Every hardware pass follows the same synchronous protocol: start the
//! feed streams, start the drain stream, block on the drain dequeue, then
//! stop everything in reverse. Failures after streaming has begun still run
//! the stop sequence so the device is left idle.

use tracing::warn;

use crate::foundation::error::PlaneweaveResult;

use super::{MediaBus, NodeHandle, StreamDirection};

/// Runs one pass to completion.
///
/// With `strict_feeds`, a feed that fails to start aborts the pass; without
/// it the failure is logged and the remaining streams are still attempted,
/// leaving the drain dequeue to surface the real error.
pub(crate) fn stream_pass<B: MediaBus + ?Sized>(
    bus: &mut B,
    feeds: &[NodeHandle],
    drain: NodeHandle,
    strict_feeds: bool,
) -> PlaneweaveResult<()> {
    for &feed in feeds {
        if let Err(err) = bus.stream_on(feed, StreamDirection::Feed) {
            if strict_feeds {
                return Err(err);
            }
            warn!(error = %err, "feed stream failed to start");
        }
    }

    let result = match bus.stream_on(drain, StreamDirection::Drain) {
        Ok(()) => bus.dequeue_buffer(drain, StreamDirection::Drain),
        Err(err) => Err(err),
    };

    if let Err(err) = bus.stream_off(drain, StreamDirection::Drain) {
        warn!(error = %err, "drain stream failed to stop");
    }
    for &feed in feeds {
        if let Err(err) = bus.stream_off(feed, StreamDirection::Feed) {
            warn!(error = %err, "feed stream failed to stop");
        }
    }
    result
}
