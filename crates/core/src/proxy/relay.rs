//! Buffered relay of a remote media URL.

use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::{self, HeaderMap};
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::{ByteRange, ProxyError};
use crate::metrics;

/// Response headers copied from the origin.
const FORWARDED_HEADERS: [header::HeaderName; 4] = [
    header::CONTENT_LENGTH,
    header::CONTENT_TYPE,
    header::ETAG,
    header::LAST_MODIFIED,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxySettings {
    /// Bytes read from the origin before draining.
    pub buffer_size: usize,
    /// Size of the chunks emitted to the client.
    pub read_size: usize,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            buffer_size: 1024 * 1024,
            read_size: 8192,
        }
    }
}

/// Body of a relayed response.
pub type ProxyBody = Pin<Box<dyn Stream<Item = Result<Bytes, ProxyError>> + Send>>;

/// An open upstream response, ready to be streamed.
pub struct ProxiedStream {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ProxyBody,
}

impl std::fmt::Debug for ProxiedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxiedStream")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Origin headers fetched without streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginHead {
    pub status: StatusCode,
    pub content_length: Option<u64>,
}

/// Relays remote media through a fixed-size buffer.
#[derive(Clone)]
pub struct StreamProxy {
    client: reqwest::Client,
    settings: ProxySettings,
}

impl StreamProxy {
    pub fn new(client: reqwest::Client, settings: ProxySettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> ProxySettings {
        self.settings
    }

    /// Issue one upstream request and return its status, headers and body.
    ///
    /// Dropping the body closes the upstream connection.
    pub async fn open(&self, url: &str, range: Option<ByteRange>) -> Result<ProxiedStream, ProxyError> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            debug!(range = %range, "Forwarding range");
            request = request.header(header::RANGE, range.to_string());
        }

        let response = request.send().await.map_err(|e| {
            metrics::PROXY_STREAMS.with_label_values(&["request_failed"]).inc();
            ProxyError::Request(e)
        })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            metrics::PROXY_STREAMS.with_label_values(&["upstream_status"]).inc();
            warn!(status = status.as_u16(), "Upstream refused stream");
            return Err(ProxyError::UpstreamStatus(status.as_u16()));
        }

        let mut headers = HeaderMap::new();
        for name in FORWARDED_HEADERS {
            if let Some(value) = response.headers().get(&name) {
                headers.insert(name, value.clone());
            }
        }
        if status == StatusCode::PARTIAL_CONTENT {
            if let Some(value) = response.headers().get(header::CONTENT_RANGE) {
                headers.insert(header::CONTENT_RANGE, value.clone());
            }
        }

        metrics::PROXY_STREAMS.with_label_values(&["opened"]).inc();
        let upstream = response.bytes_stream().boxed();
        Ok(ProxiedStream {
            status,
            headers,
            body: rebuffer(upstream, self.settings),
        })
    }

    /// HEAD the origin.
    pub async fn head(&self, url: &str) -> Result<OriginHead, ProxyError> {
        let response = self.client.head(url).send().await?;
        let content_length = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        Ok(OriginHead {
            status: response.status(),
            content_length,
        })
    }
}

struct RelayState {
    upstream: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: BytesMut,
    eof: bool,
    failed: bool,
    settings: ProxySettings,
}

/// Fill the buffer from upstream, then drain it in read-sized chunks, until EOF.
fn rebuffer(
    upstream: BoxStream<'static, reqwest::Result<Bytes>>,
    settings: ProxySettings,
) -> ProxyBody {
    let state = RelayState {
        upstream,
        buffer: BytesMut::with_capacity(settings.buffer_size),
        eof: false,
        failed: false,
        settings,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        if state.failed {
            return None;
        }
        if state.buffer.is_empty() {
            if state.eof {
                debug!("Upstream stream finished");
                return None;
            }
            while state.buffer.len() < state.settings.buffer_size && !state.eof {
                match state.upstream.next().await {
                    Some(Ok(bytes)) => state.buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        warn!(error = %e, "Upstream failed mid-stream");
                        metrics::PROXY_STREAMS.with_label_values(&["aborted"]).inc();
                        state.failed = true;
                        return Some((Err(ProxyError::Stream(e.to_string())), state));
                    }
                    None => state.eof = true,
                }
            }
            if state.buffer.is_empty() {
                return None;
            }
        }

        let take = state.settings.read_size.min(state.buffer.len());
        let chunk = state.buffer.split_to(take).freeze();
        metrics::PROXY_BYTES.inc_by(chunk.len() as u64);
        Some((Ok(chunk), state))
    }))
}
