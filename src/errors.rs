use std::{io, net::SocketAddr};

/// Everything that can end a connection or the server.
///
/// Request-level failures (`RequestLine` .. `Decode`) are fatal to the
/// connection that produced them. `Bind` and `Accept` are fatal to the
/// whole server. A route miss is never an error, it becomes a `404`.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("failed to parse request line")]
    RequestLine,
    #[error("failed to parse request headers")]
    HeaderBlock,
    #[error("request head is not valid UTF-8")]
    InvalidEncoding,
    #[error("invalid Content-Length header")]
    InvalidContentLength,

    #[error("request head exceeds {0} bytes")]
    HeadTooLarge(usize),
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("failed to decode request body: {0}")]
    Decode(String),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("error accepting connection: {0}")]
    Accept(#[source] io::Error),
    #[error("route handler failed: {0}")]
    Handler(#[source] io::Error),
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ErrorKind {
    /// `true` for errors caused by the bytes the client sent.
    #[inline]
    pub const fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::RequestLine
                | Self::HeaderBlock
                | Self::InvalidEncoding
                | Self::InvalidContentLength
                | Self::HeadTooLarge(_)
                | Self::BodyTooLarge(_)
                | Self::Decode(_)
        )
    }

    // Written before closing a connection whose request could not be parsed.
    pub(crate) const fn as_http(&self) -> &'static [u8] {
        b"HTTP/1.1 400 BadRequest\r\nConnection: close\r\nContent-Length: 0\r\n\r\n"
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        use ErrorKind::*;

        match (self, other) {
            (HeadTooLarge(a), HeadTooLarge(b)) | (BodyTooLarge(a), BodyTooLarge(b)) => a == b,
            (Decode(a), Decode(b)) => a == b,
            (Bind { addr: a, source: x }, Bind { addr: b, source: y }) => {
                a == b && x.kind() == y.kind()
            }
            (Accept(a), Accept(b)) | (Handler(a), Handler(b)) | (Io(a), Io(b)) => {
                a.kind() == b.kind()
            }
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}
