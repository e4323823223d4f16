//! mini_web - small HTTP/1.1 server on raw TCP sockets
//!
//! Requests are read straight from a tokio `TcpStream`, parsed, matched
//! against a table of `METHOD /path/{param}` routes and answered by async
//! handlers. Responses are buffered and written with an exact
//! `Content-Length`, optionally gzip-compressed.
//!
//! # Protocol Support
//!
//! - **HTTP/1.1** with persistent connections; `Connection: close` ends the
//!   connection after the response
//! - Request bodies framed by `Content-Length`, no chunked encoding
//! - `gzip` for `Accept-Encoding` and `Content-Encoding`, see [`Encodings`]
//!
//! # Examples
//!
//! ```no_run
//! use mini_web::{Handler, Request, ResponseWriter, Router, Server, StatusCode};
//! use std::io;
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     async fn handle(&self, req: &Request, resp: &mut ResponseWriter) -> io::Result<()> {
//!         let value = req.path_value("value").to_owned();
//!         resp.status(StatusCode::OK)
//!             .header("Content-Type", "text/plain")
//!             .body(value);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mini_web::ErrorKind> {
//!     let router = Router::builder()
//!         .route("GET", "/echo/{value}", Echo)
//!         .build();
//!
//!     Server::builder()
//!         .port(4221)
//!         .router(router)
//!         .build()?
//!         .launch()
//!         .await
//! }
//! ```
//!
//! The shipped handlers (`/`, `/echo/{value}`, `/user-agent`, `/files/{filename}`)
//! live in [`handlers`].

pub(crate) mod http {
    pub(crate) mod encoding;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod router;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod handlers;
pub mod limits;

pub use crate::{
    errors::ErrorKind,
    http::{
        encoding::{decode, encode, Encoding, Encodings},
        request::Request,
        response::ResponseWriter,
        router::{Pattern, Route, Router, RouterBuilder, Segment, ANY_METHOD},
        types::{Headers, StatusCode, StatusLine},
    },
    server::server_impl::{CloseHandle, Handler, Server, ServerBuilder},
};
