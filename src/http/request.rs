use crate::{
    errors::ErrorKind,
    http::{encoding, router::Pattern, types::Headers},
    limits::ReqLimits,
};
use memchr::{memchr, memmem};
use std::{borrow::Cow, io, sync::Arc};
use tokio::io::{AsyncRead, AsyncReadExt};

const CRLF: &[u8] = b"\r\n";
const END_OF_HEAD: &[u8] = b"\r\n\r\n";

/// Parsed HTTP request.
///
/// # Input format
///
/// - `SP`: ASCII space (0x20)
/// - `CRLF`: `"\r\n"`, **exactly this sequence is required**
///
/// ## Request line
///
/// ```text
/// [METHOD] SP [TARGET] SP [VERSION] CRLF
/// ```
///
/// The line is split on the first two spaces. Method and version are not
/// validated, the version keeps any further spaces:
///
/// ```text
/// GET /echo/abc HTTP/1.1       // "GET", "/echo/abc", "HTTP/1.1"
/// GET /a b HTTP/1.1            // "GET", "/a", "b HTTP/1.1"
/// GET /echo/abc                // Error: two tokens
/// ```
///
/// The target is kept as sent. There is no query-string separation and no
/// percent-decoding.
///
/// ## Headers
///
/// ```text
/// [NAME] ":" [VALUE] CRLF
/// ```
///
/// Split on the first colon; the value is trimmed, the name is kept as is.
/// Names are case-sensitive and a repeated name keeps the last value. The
/// first line without a colon (normally the empty line) ends the header
/// block and the body starts right after it.
///
/// ## Body
///
/// With `Content-Length`, exactly that many bytes after the header block.
/// Without it, everything after the header block minus trailing NUL bytes.
/// With a `Content-Encoding` header the body is decoded, see
/// [`encoding::decode`]; the decoded body may not exceed
/// [`ReqLimits::body_size`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: String,
    target: String,
    version: String,

    headers: Headers,
    body: Vec<u8>,

    pattern: Option<Arc<Pattern>>,
}

// Public API
impl Request {
    #[inline(always)]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline(always)]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[inline(always)]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[inline(always)]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the header stored under exactly `name`.
    #[inline(always)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Decoded body bytes, empty if the request had none.
    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[inline]
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Pattern of the route that matched this request.
    #[inline]
    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_deref()
    }

    /// Value of the `{name}` segment of the matched route.
    ///
    /// Returns an empty string when no route is bound or the pattern has no
    /// such placeholder.
    ///
    /// # Examples
    /// ```
    /// use mini_web::Request;
    ///
    /// let req = Request::parse(b"GET /echo/abc HTTP/1.1\r\n\r\n").unwrap();
    /// assert_eq!(req.path_value("value"), "");
    /// ```
    pub fn path_value(&self, name: &str) -> &str {
        self.pattern
            .as_ref()
            .and_then(|pattern| pattern.value(&self.target, name))
            .unwrap_or("")
    }

    #[inline]
    pub(crate) fn bind_pattern(&mut self, pattern: Arc<Pattern>) {
        self.pattern = Some(pattern);
    }
}

// Parse
impl Request {
    /// Parses one complete request from `buffer` with the default limits.
    #[inline]
    pub fn parse(buffer: &[u8]) -> Result<Self, ErrorKind> {
        Self::parse_with_limits(buffer, &ReqLimits::default())
    }

    pub(crate) fn parse_with_limits(buffer: &[u8], limits: &ReqLimits) -> Result<Self, ErrorKind> {
        let end_first_line = memmem::find(buffer, CRLF).ok_or(ErrorKind::RequestLine)?;
        let (method, target, version) = Self::parse_request_line(&buffer[..end_first_line])?;

        let (headers, start_body) = Self::parse_headers(buffer, end_first_line + 2)?;

        let (head, rest) = buffer.split_at(start_body.min(buffer.len()));
        let body = match content_length(head)? {
            Some(len) => &rest[..len.min(rest.len())],
            None => {
                let end = rest.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                &rest[..end]
            }
        };

        let body = match headers.get("Content-Encoding") {
            Some(encoding) => encoding::decode(encoding, body, limits.body_size)?,
            None => body.to_vec(),
        };

        Ok(Request {
            method: method.to_owned(),
            target: target.to_owned(),
            version: version.to_owned(),
            headers,
            body,
            pattern: None,
        })
    }

    #[inline]
    fn parse_request_line(line: &[u8]) -> Result<(&str, &str, &str), ErrorKind> {
        let line = to_str(line)?;
        let mut parts = line.splitn(3, ' ');

        match (parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(target), Some(version)) => Ok((method, target, version)),
            _ => Err(ErrorKind::RequestLine),
        }
    }

    fn parse_headers(buffer: &[u8], mut start: usize) -> Result<(Headers, usize), ErrorKind> {
        let mut headers = Headers::new();

        loop {
            let rest = buffer.get(start..).ok_or(ErrorKind::HeaderBlock)?;
            let end = memmem::find(rest, CRLF).ok_or(ErrorKind::HeaderBlock)?;
            let line = &rest[..end];

            start += end + 2;

            let Some(colon) = memchr(b':', line) else {
                break;
            };

            let name = to_str(&line[..colon])?;
            let value = to_str(&line[colon + 1..])?;
            headers.insert(name, value.trim());
        }

        Ok((headers, start))
    }
}

#[inline(always)]
fn to_str(value: &[u8]) -> Result<&str, ErrorKind> {
    simdutf8::basic::from_utf8(value).map_err(|_| ErrorKind::InvalidEncoding)
}

// Framing

/// Accumulates socket reads until one whole request is buffered.
#[derive(Debug)]
pub(crate) struct Parser {
    buffer: Vec<u8>,
    limits: ReqLimits,
}

impl Parser {
    #[inline]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        Self {
            buffer: Vec::with_capacity(limits.read_chunk),
            limits: limits.clone(),
        }
    }

    /// Reads the next request frame.
    ///
    /// `Ok(None)` means the peer closed the connection between requests.
    /// Bytes received after the frame stay buffered for the next call.
    pub(crate) async fn read_frame<R>(&mut self, stream: &mut R) -> Result<Option<Vec<u8>>, ErrorKind>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if let Some(len) = self.complete_frame()? {
                return Ok(Some(self.buffer.drain(..len).collect()));
            }

            if self.fill_buffer(stream).await? != 0 {
                continue;
            }

            return match (self.buffer.is_empty(), self.head_end()) {
                (true, _) => Ok(None),
                // Let the request parser describe what is wrong with the head.
                (false, None) => Ok(Some(std::mem::take(&mut self.buffer))),
                (false, Some(_)) => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed inside request body",
                )
                .into()),
            };
        }
    }

    #[inline]
    async fn fill_buffer<R>(&mut self, stream: &mut R) -> Result<usize, io::Error>
    where
        R: AsyncRead + Unpin,
    {
        let start = self.buffer.len();
        self.buffer.resize(start + self.limits.read_chunk, 0);

        let result = stream.read(&mut self.buffer[start..]).await;
        self.buffer.truncate(start + *result.as_ref().unwrap_or(&0));

        result
    }

    // Length of the first complete frame in the buffer, if there is one.
    fn complete_frame(&self) -> Result<Option<usize>, ErrorKind> {
        let Some(head_end) = self.head_end() else {
            if self.buffer.len() > self.limits.head_size {
                return Err(ErrorKind::HeadTooLarge(self.limits.head_size));
            }
            return Ok(None);
        };

        if head_end > self.limits.head_size {
            return Err(ErrorKind::HeadTooLarge(self.limits.head_size));
        }

        match content_length(&self.buffer[..head_end])? {
            Some(len) if len > self.limits.body_size => {
                Err(ErrorKind::BodyTooLarge(self.limits.body_size))
            }
            Some(len) if self.buffer.len() >= head_end + len => Ok(Some(head_end + len)),
            Some(_) => Ok(None),
            None => Ok(Some(head_end)),
        }
    }

    #[inline]
    fn head_end(&self) -> Option<usize> {
        memmem::find(&self.buffer, END_OF_HEAD).map(|i| i + END_OF_HEAD.len())
    }
}

// `Content-Length` of a complete head, the name is matched case-insensitively.
fn content_length(head: &[u8]) -> Result<Option<usize>, ErrorKind> {
    let mut length = None;

    for line in head.split(|&b| b == b'\n').skip(1) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(colon) = memchr(b':', line) else {
            continue;
        };

        if line[..colon].eq_ignore_ascii_case(b"content-length") {
            let value = line[colon + 1..].trim_ascii();
            length = Some(slice_to_usize(value).ok_or(ErrorKind::InvalidContentLength)?);
        }
    }

    Ok(length)
}

#[inline(always)]
fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}
