//! Server configuration and request size limits
//!
//! Every structure has public fields and a [`Default`] implementation, so
//! only the values that differ need to be written out:
//!
//! ```no_run
//! # use mini_web::Router;
//! use mini_web::{Server, limits::{ReqLimits, ServerLimits}};
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .port(4221)
//!         .router(Router::builder().build())
//!         .server_limits(ServerLimits {
//!             backlog: 128,
//!             ..ServerLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             body_size: 16 * 1024 * 1024, // 16MB uploads
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .unwrap()
//!         .launch()
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! No read or write timeouts exist: a silent client keeps its connection
//! task alive until it disconnects.

/// Listener-level settings.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Protocol written at the start of every status line (default: `HTTP/1.1`).
    pub protocol: &'static str,

    /// Length of the kernel accept queue (default: `1024`).
    ///
    /// Only used when the server binds its own socket through
    /// [`ServerBuilder::port`](crate::ServerBuilder::port).
    pub backlog: i32,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            protocol: "HTTP/1.1",
            backlog: 1024,
        }
    }
}

/// Bounds applied while a request is read from the socket.
///
/// # Framing
///
/// The reader pulls at most `read_chunk` bytes per socket read and keeps
/// going until the blank line ending the header block is buffered. If the
/// head declares `Content-Length`, it then reads until the whole body is
/// buffered. Without `Content-Length` the body is empty and the frame ends at
/// the blank line; bytes after it stay buffered as the next request.
///
/// ```text
/// |<------------- head_size ------------->|<--- body_size --->|
/// GET /echo/abc HTTP/1.1\r\nHost: x\r\n\r\nbody bytes .........
/// ```
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Bytes requested from the socket per read (default: `4096`).
    pub read_chunk: usize,

    /// Maximum size of request line plus headers plus the blank line (default: `8KB`).
    pub head_size: usize,

    /// Maximum declared `Content-Length` and maximum body size after
    /// `Content-Encoding` decoding (default: `1MB`).
    pub body_size: usize,
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            read_chunk: 4096,
            head_size: 8 * 1024,
            body_size: 1024 * 1024,
        }
    }
}

/// Response buffer settings.
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial capacity of the serialized response buffer (default: `512`).
    pub default_capacity: usize,
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            default_capacity: 512,
        }
    }
}
