//! Streamed relay of an upstream response to the caller.

use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::lease::NodeLease;
use crate::upstream::UpstreamClient;

/// Inline event sent when the upstream fails after assignment.
pub const ERROR_EVENT: &[u8] =
    b"data: {\"error\": \"The compute node failed during the request.\"}\n\n";

/// First event of every session, naming the node that serves it.
pub fn node_assigned_event(node_name: &str) -> Bytes {
    Bytes::from(format!(
        "event: node_assigned\ndata: {}\n\n",
        json!({ "node_name": node_name })
    ))
}

/// Finds a byte marker in a chunked stream, including markers split
/// across chunk boundaries.
#[derive(Debug)]
pub struct MarkerScanner {
    marker: Vec<u8>,
    tail: Vec<u8>,
    found: bool,
}

impl MarkerScanner {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.as_bytes().to_vec(),
            tail: Vec::new(),
            found: false,
        }
    }

    /// Feed the next chunk. Returns true once the marker has been seen.
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        if self.found || self.marker.is_empty() {
            return self.found;
        }

        let mut window = std::mem::take(&mut self.tail);
        window.extend_from_slice(chunk);
        if window.windows(self.marker.len()).any(|w| w == self.marker.as_slice()) {
            self.found = true;
            return true;
        }

        let keep = (self.marker.len() - 1).min(window.len());
        self.tail = window.split_off(window.len() - keep);
        false
    }

    pub fn found(&self) -> bool {
        self.found
    }
}

/// How a relay ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RelayOutcome {
    /// The upstream body ended normally.
    Completed,
    /// The caller's side of the channel closed.
    CallerGone,
    /// Connect, status, read or timeout failure.
    Failed(String),
}

/// POST `payload` to `url` and forward the body chunk by chunk into `tx`.
///
/// Releases `lease` right after forwarding the chunk in which `marker`
/// shows up. The
/// caller is responsible for the final release on every outcome.
pub(crate) async fn relay<T: serde::Serialize>(
    upstream: &UpstreamClient,
    url: &str,
    payload: &T,
    tx: &mpsc::Sender<Bytes>,
    lease: &mut NodeLease,
    marker: &str,
) -> RelayOutcome {
    let response = tokio::select! {
        r = upstream.send(url, payload) => r,
        _ = tx.closed() => return RelayOutcome::CallerGone,
    };
    let mut body = match response {
        Ok(resp) => resp.into_body(),
        Err(e) => return RelayOutcome::Failed(e.to_string()),
    };

    let mut scanner = MarkerScanner::new(marker);
    let read_timeout = upstream.timeout();

    loop {
        let next = tokio::select! {
            f = tokio::time::timeout(read_timeout, body.frame()) => f,
            _ = tx.closed() => return RelayOutcome::CallerGone,
        };

        let frame = match next {
            Err(_) => return RelayOutcome::Failed("upstream read timed out".to_string()),
            Ok(None) => return RelayOutcome::Completed,
            Ok(Some(Err(e))) => return RelayOutcome::Failed(e.to_string()),
            Ok(Some(Ok(frame))) => frame,
        };
        let Ok(data) = frame.into_data() else {
            continue;
        };

        let marker_seen = !scanner.found() && scanner.feed(&data);

        if tx.send(data).await.is_err() {
            debug!(node_id = lease.node().id, "caller dropped mid-stream");
            return RelayOutcome::CallerGone;
        }

        // The marker chunk goes out before the unlock round trip.
        if marker_seen {
            info!(node_id = lease.node().id, "completion marker seen, releasing node");
            lease.release().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "\"done\":true";

    #[test]
    fn finds_marker_in_one_chunk() {
        let mut s = MarkerScanner::new(MARKER);
        assert!(!s.feed(b"{\"message\":{},\"done\":false}\n"));
        assert!(s.feed(b"{\"done\":true}\n"));
        assert!(s.found());
    }

    #[test]
    fn finds_marker_split_across_chunks() {
        let mut s = MarkerScanner::new(MARKER);
        assert!(!s.feed(b"{\"message\":{},\"do"));
        assert!(!s.feed(b"ne\":t"));
        assert!(s.feed(b"rue}\n"));
    }

    #[test]
    fn finds_marker_fed_byte_by_byte() {
        let mut s = MarkerScanner::new(MARKER);
        let stream = b"xx{\"done\":true}";
        let hits: Vec<bool> = stream.iter().map(|b| s.feed(&[*b])).collect();
        assert_eq!(hits.iter().filter(|h| !**h).count(), stream.len() - 2);
        assert!(hits[hits.len() - 2]);
    }

    #[test]
    fn similar_text_does_not_match() {
        let mut s = MarkerScanner::new(MARKER);
        assert!(!s.feed(b"{\"done\":false}"));
        assert!(!s.feed(b"\"done\": true"));
        assert!(!s.found());
    }

    #[test]
    fn stays_found_after_first_sighting() {
        let mut s = MarkerScanner::new(MARKER);
        assert!(s.feed(b"\"done\":true"));
        assert!(s.feed(b"trailing"));
    }

    #[test]
    fn empty_marker_never_matches() {
        let mut s = MarkerScanner::new("");
        assert!(!s.feed(b"anything"));
    }

    #[test]
    fn node_assigned_event_shape() {
        let ev = node_assigned_event("gpu-box \"1\"");
        let text = std::str::from_utf8(&ev).unwrap();
        assert!(text.starts_with("event: node_assigned\ndata: "));
        assert!(text.ends_with("\n\n"));
        let data: serde_json::Value =
            serde_json::from_str(text.lines().nth(1).unwrap().trim_start_matches("data: ")).unwrap();
        assert_eq!(data["node_name"], "gpu-box \"1\"");
    }
}
