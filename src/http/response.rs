//! Buffered HTTP response writer.

use crate::{
    http::{
        encoding,
        types::{Headers, StatusCode, StatusLine},
    },
    limits::RespLimits,
};
use std::borrow::Cow;

/// Accumulates a status and headers, then serializes the whole response
/// when the body is written.
///
/// Instances are created by the server for every request and passed to
/// [`Handler::handle`](crate::Handler::handle). The server may already have
/// set `Connection: close` or `Content-Encoding` before the handler runs.
///
/// # Serialization
///
/// ```text
/// HTTP/1.1 200 OK\r\n
/// Content-Type: text/plain\r\n       <- headers, in insertion order
/// Content-Length: 3\r\n              <- always recomputed
/// \r\n
/// abc
/// ```
///
/// - With a `Content-Encoding` header, the body is encoded first. If encoding
///   fails, the plain body is sent and a warning is logged.
/// - `Content-Length` is the length of the bytes actually sent and replaces
///   any value set by the handler.
///
/// # Examples
/// ```
/// use mini_web::{ResponseWriter, StatusCode};
///
/// let mut resp = ResponseWriter::new("HTTP/1.1");
/// resp.status(StatusCode::OK)
///     .header("Content-Type", "text/plain")
///     .body("abc");
///
/// assert_eq!(
///     resp.buffer(),
///     b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 3\r\n\r\nabc"
/// );
/// ```
///
/// # Panics
/// Writing the body twice panics in `debug` mode. In `release` mode the
/// second body replaces the first response.
#[derive(Debug)]
pub struct ResponseWriter {
    protocol: &'static str,
    status: StatusCode,
    headers: Headers,

    buffer: Vec<u8>,
    state: ResponseState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ResponseState {
    Clean,
    Complete,
}

impl ResponseWriter {
    #[inline]
    pub fn new(protocol: &'static str) -> Self {
        Self::with_limits(protocol, &RespLimits::default())
    }

    #[inline]
    pub(crate) fn with_limits(protocol: &'static str, limits: &RespLimits) -> Self {
        Self {
            protocol,
            status: StatusCode::OK,
            headers: Headers::new(),

            buffer: Vec::with_capacity(limits.default_capacity),
            state: ResponseState::Clean,
        }
    }

    /// Serialized response, empty until the body is written.
    #[inline(always)]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    #[inline(always)]
    pub fn is_complete(&self) -> bool {
        self.state == ResponseState::Complete
    }
}

impl ResponseWriter {
    /// Sets the status code (default: `200 OK`).
    #[inline]
    #[track_caller]
    pub fn status<S: Into<StatusCode>>(&mut self, status: S) -> &mut Self {
        debug_assert!(
            self.state == ResponseState::Clean,
            "Must be called before body()"
        );

        self.status = status.into();
        self
    }

    #[inline(always)]
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Sets a header, replacing an earlier value with the same name.
    ///
    /// `Content-Length` may be set but is always overwritten by [`body`](Self::body).
    #[inline]
    #[track_caller]
    pub fn header<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> &mut Self {
        debug_assert!(
            self.state == ResponseState::Clean,
            "Must be called before body()"
        );

        self.headers.insert(name, value);
        self
    }

    #[inline(always)]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[inline(always)]
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Writes the body and finalizes the response.
    ///
    /// Returns the number of body bytes placed on the wire, which differs
    /// from `data.len()` when the response is encoded.
    #[inline]
    #[track_caller]
    pub fn body<T: AsRef<[u8]>>(&mut self, data: T) -> usize {
        debug_assert!(
            self.state == ResponseState::Clean,
            "The body must be written exactly once"
        );

        let body = self.encoded_body(data.as_ref());
        self.headers
            .insert("Content-Length", body.len().to_string());

        self.buffer.clear();
        StatusLine::new(self.protocol, self.status).write_to(&mut self.buffer);
        for (name, value) in self.headers.iter() {
            self.buffer.extend_from_slice(name.as_bytes());
            self.buffer.extend_from_slice(b": ");
            self.buffer.extend_from_slice(value.as_bytes());
            self.buffer.extend_from_slice(b"\r\n");
        }
        self.buffer.extend_from_slice(b"\r\n");
        self.buffer.extend_from_slice(&body);

        self.state = ResponseState::Complete;
        body.len()
    }

    fn encoded_body<'a>(&self, body: &'a [u8]) -> Cow<'a, [u8]> {
        let Some(encoding) = self.headers.get("Content-Encoding") else {
            return Cow::Borrowed(body);
        };

        match encoding::encode(encoding, body) {
            Ok(encoded) => Cow::Owned(encoded),
            Err(err) => {
                tracing::warn!(encoding, error = %err, "failed to encode response body, sending it unencoded");
                Cow::Borrowed(body)
            }
        }
    }
}
