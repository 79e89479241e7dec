//! The primary read-write stream seam and the shadowing wrapper around it.

mod interceptor;
pub use interceptor::ShadowingStream;

use bytes::Bytes;

/// The host's view of a request body stream.
///
/// `write` and `end` push data toward the primary destination; `pause` and
/// `resume` control the upstream source producing that data. `resume` must be
/// idempotent: resuming an already-running (or never-paused) stream must not
/// re-deliver chunks.
pub trait ReadWriteStream: Send {
    /// Writes one chunk; returns `self` for chaining.
    fn write(&mut self, chunk: Bytes) -> &mut Self;

    fn end(&mut self);

    /// Stops the upstream source from producing further chunks.
    fn pause(&mut self);

    /// Restarts a paused upstream source.
    fn resume(&mut self);
}
