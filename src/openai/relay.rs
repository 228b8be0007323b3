//! Re-frames a provider's streaming completion into a clean SSE stream
//! of plain text deltas.
//!
//! Each upstream `data:` line carrying a JSON chunk becomes one
//! downstream event holding the sanitized `choices[0].delta.content`.
//! Malformed lines are dropped individually; only a failing read ends
//! the stream early.

use std::fmt::Display;

use bytes::Bytes;
use futures::Stream;
use futures_util::StreamExt;
use serde_json::Value;

use crate::core::{RelayError, sanitize};
use crate::sse::{DONE, LineBuffer, SseLine, classify, encode_event};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RelayState {
    AwaitingBytes,
    HavePartialLine,
    Terminated,
}

/// Synchronous core of the relay: feed it upstream chunks, get back
/// the downstream events they complete.
#[derive(Debug)]
pub struct FrameDecoder {
    lines: LineBuffer,
    state: RelayState,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            lines: LineBuffer::new(),
            state: RelayState::AwaitingBytes,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        if self.state == RelayState::Terminated {
            tracing::warn!("Ignoring {} bytes received after termination", chunk.len());
            return Vec::new();
        }

        let frames = self
            .lines
            .push(chunk)
            .iter()
            .filter_map(|line| reframe_line(line))
            .collect();

        self.state = if self.lines.has_partial_line() {
            RelayState::HavePartialLine
        } else {
            RelayState::AwaitingBytes
        };
        frames
    }

    /// Upstream is done. A trailing line without a newline is dropped.
    pub fn finish(&mut self) {
        let residual = self.lines.finish();
        if !residual.is_empty() {
            tracing::debug!("Discarding unterminated line: {}", residual);
        }
        self.state = RelayState::Terminated;
    }
}

fn reframe_line(line: &str) -> Option<Bytes> {
    let payload = match classify(line) {
        SseLine::Blank => return None,
        SseLine::Other(other) => {
            tracing::debug!("Ignoring non-data line: {}", other);
            return None;
        }
        SseLine::Data(payload) => payload,
    };

    // Upstream EOF ends the stream, not this sentinel, so later lines
    // are still processed
    if payload == DONE {
        return Some(encode_event(DONE));
    }

    let chunk: Value = serde_json::from_str(payload)
        .inspect_err(|e| tracing::warn!("Skipping unparseable chunk {}: {}", payload, e))
        .ok()?;
    let delta = chunk["choices"][0]["delta"]["content"]
        .as_str()
        .unwrap_or_default();

    let text = sanitize(delta);
    if text.is_empty() {
        return None;
    }
    Some(encode_event(&text))
}

/// Relay an upstream SSE body. The upstream stream is owned by the
/// returned stream and dropped exactly once, whether it ends normally,
/// fails, or the downstream side stops polling.
pub fn relay_stream<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, RelayError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut upstream = Box::pin(upstream);
        let mut frames = FrameDecoder::new();

        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) => {
                    for frame in frames.push(&bytes) {
                        yield Ok(frame);
                    }
                }
                Err(e) => {
                    tracing::error!("Upstream read failed: {}", e);
                    yield Err(RelayError::StreamRead(e.to_string()));
                    break;
                }
            }
        }

        frames.finish();
        drop(upstream);
        tracing::debug!("Released upstream reader");
    }
}

/// Relay the body of an open completion response.
pub fn relay_response(
    response: reqwest::Response,
) -> impl Stream<Item = Result<Bytes, RelayError>> + Send {
    relay_stream(response.bytes_stream())
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    use super::*;

    fn chunk(content: &str) -> String {
        serde_json::json!({
            "id": "chunk",
            "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
        })
        .to_string()
    }

    type Upstream = futures::stream::Iter<std::vec::IntoIter<Result<Bytes, io::Error>>>;

    fn upstream(parts: Vec<&[u8]>) -> Upstream {
        let parts: Vec<_> = parts
            .into_iter()
            .map(|p| Ok(Bytes::copy_from_slice(p)))
            .collect();
        futures::stream::iter(parts)
    }

    async fn relay_to_string<S>(source: S) -> String
    where
        S: Stream<Item = Result<Bytes, io::Error>> + Send + 'static,
    {
        let frames: Vec<_> = relay_stream(source).collect().await;
        frames
            .into_iter()
            .map(|f| String::from_utf8(f.unwrap().to_vec()).unwrap())
            .collect()
    }

    /// Counts how many times the wrapped stream is dropped
    struct Tracked<S> {
        inner: S,
        drops: Arc<AtomicUsize>,
    }

    impl<S: Stream + Unpin> Stream for Tracked<S> {
        type Item = S::Item;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            Pin::new(&mut self.inner).poll_next(cx)
        }
    }

    impl<S> Drop for Tracked<S> {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_relay_reframes_deltas() {
        let body = format!(
            "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
            chunk("Hel"),
            chunk("lo")
        );
        let out = relay_to_string(upstream(vec![body.as_bytes()])).await;
        assert_eq!(out, "data: Hel\n\ndata: lo\n\ndata: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_relay_reassembles_lines_split_across_reads() {
        let body = format!("data: {}\n\ndata: [DONE]\n\n", chunk("caf\u{e9}"));
        let bytes = body.as_bytes();
        // Split inside the JSON and inside the two-byte é
        let split_json = 12;
        let split_char = body.find('\u{e9}').unwrap() + 1;
        let out = relay_to_string(upstream(vec![
            &bytes[..split_json],
            &bytes[split_json..split_char],
            &bytes[split_char..],
        ]))
        .await;
        assert_eq!(out, "data: cafe\n\ndata: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_relay_sanitizes_deltas() {
        let body = format!("data: {}\n\n", chunk("\u{201C}hi\u{201D}\u{2014}ok\u{2026}"));
        let out = relay_to_string(upstream(vec![body.as_bytes()])).await;
        assert_eq!(out, "data: \"hi\"-ok...\n\n");
    }

    #[tokio::test]
    async fn test_relay_never_emits_empty_deltas() {
        let role_only = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        let body = format!(
            "data: {}\n\ndata: {}\n\ndata: {}\n\ndata: {}\n\n",
            role_only,
            chunk(""),
            chunk("\u{1F600}"),
            r#"{"choices":[]}"#
        );
        let out = relay_to_string(upstream(vec![body.as_bytes()])).await;
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn test_relay_skips_malformed_and_foreign_lines() {
        let body = format!(
            ": keep-alive\nevent: message\ndata: {{not json\n\ndata: {}\n\n",
            chunk("ok")
        );
        let out = relay_to_string(upstream(vec![body.as_bytes()])).await;
        assert_eq!(out, "data: ok\n\n");
    }

    #[tokio::test]
    async fn test_relay_closes_without_done() {
        let body = format!("data: {}\n\n", chunk("partial answer"));
        let out = relay_to_string(upstream(vec![body.as_bytes()])).await;
        assert_eq!(out, "data: partial answer\n\n");
        assert!(!out.contains(DONE));
    }

    #[tokio::test]
    async fn test_relay_keeps_processing_after_done() {
        let body = format!("data: [DONE]\n\ndata: {}\n\n", chunk("late"));
        let out = relay_to_string(upstream(vec![body.as_bytes()])).await;
        assert_eq!(out, "data: [DONE]\n\ndata: late\n\n");
        assert_eq!(out.matches(DONE).count(), 1);
    }

    #[tokio::test]
    async fn test_relay_discards_unterminated_trailing_line() {
        let body = format!("data: {}\n\ndata: {}", chunk("kept"), chunk("lost"));
        let out = relay_to_string(upstream(vec![body.as_bytes()])).await;
        assert_eq!(out, "data: kept\n\n");
    }

    #[tokio::test]
    async fn test_relay_recovers_from_corrupted_bytes() {
        let line = format!("data: {}\n\n", chunk("fine"));
        let mut corrupted = vec![0xff];
        corrupted.extend_from_slice(line.as_bytes());
        let out = relay_to_string(upstream(vec![&corrupted])).await;
        assert_eq!(out, "data: fine\n\n");
    }

    #[tokio::test]
    async fn test_relay_read_error_ends_stream_and_releases_reader() {
        let drops = Arc::new(AtomicUsize::new(0));
        let first = format!("data: {}\n\n", chunk("before"));
        let parts = vec![
            Ok(Bytes::from(first)),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from(format!("data: {}\n\n", chunk("after")))),
        ];
        let source = Tracked {
            inner: futures::stream::iter(parts),
            drops: Arc::clone(&drops),
        };

        let items: Vec<_> = relay_stream(source).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].as_ref().unwrap(),
            &Bytes::from_static(b"data: before\n\n")
        );
        assert!(matches!(items[1], Err(RelayError::StreamRead(_))));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_relay_releases_reader_when_downstream_stops_early() {
        let drops = Arc::new(AtomicUsize::new(0));
        let body = format!("data: [DONE]\n\ndata: {}\n\n", chunk("unread"));
        let source = Tracked {
            inner: upstream(vec![body.as_bytes()]),
            drops: Arc::clone(&drops),
        };

        let mut relayed = Box::pin(relay_stream(source));
        let first = relayed.next().await.unwrap().unwrap();
        assert_eq!(first, Bytes::from_static(b"data: [DONE]\n\n"));
        drop(relayed);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_frame_decoder_states() {
        let mut frames = FrameDecoder::new();
        assert_eq!(frames.state(), RelayState::AwaitingBytes);

        assert!(frames.push(b"data: {\"choi").is_empty());
        assert_eq!(frames.state(), RelayState::HavePartialLine);

        let out = frames.push(b"ces\":[{\"delta\":{\"content\":\"x\"}}]}\n");
        assert_eq!(out, vec![Bytes::from_static(b"data: x\n\n")]);
        assert_eq!(frames.state(), RelayState::AwaitingBytes);

        frames.finish();
        assert_eq!(frames.state(), RelayState::Terminated);
        assert!(frames.push(b"data: [DONE]\n").is_empty());
    }
}
