//! Consumes and discards the shadow backend's response.

use futures::StreamExt;
use tracing::debug;

use crate::transport::ShadowResponse;

/// Drains the shadow response on a background task.
///
/// The status is logged at debug level and the body streamed to nowhere; a
/// read error stops the drain and is likewise only logged. Nothing observed
/// here is exposed to any caller. Dropping the body stream at the end releases
/// the shadow connection.
pub(crate) fn discard(response: ShadowResponse) {
    debug!(status = %response.status(), "traffic shadowing response received");

    let mut body = response.into_body();
    tokio::spawn(async move {
        while let Some(item) = body.next().await {
            if let Err(e) = item {
                debug!(error = %e, "error while reading shadow response body, discarding the rest");
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::testing::wait_until;
    use bytes::Bytes;
    use http::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn drains_body_to_completion() {
        let consumed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&consumed);
        let body = futures::stream::iter(vec![Ok(Bytes::from_static(b"a")), Ok(Bytes::from_static(b"b"))])
            .inspect(move |_| {
                counter.fetch_add(1, Ordering::AcqRel);
            });

        discard(ShadowResponse::new(StatusCode::OK, body));

        wait_until(|| consumed.load(Ordering::Acquire) == 2).await;
    }

    #[tokio::test]
    async fn read_error_stops_the_drain() {
        let consumed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&consumed);
        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"a")),
            Err(TransportError::closed("reset")),
            Ok(Bytes::from_static(b"never read")),
        ])
        .inspect(move |_| {
            counter.fetch_add(1, Ordering::AcqRel);
        });

        discard(ShadowResponse::new(StatusCode::BAD_GATEWAY, body));

        wait_until(|| consumed.load(Ordering::Acquire) == 2).await;

        // the item after the error is never taken
        tokio::task::yield_now().await;
        assert_eq!(consumed.load(Ordering::Acquire), 2);
    }
}
