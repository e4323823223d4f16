//! Route handlers shipped with the `mini_web` binary.
//!
//! | Route                      | Handler       |
//! |----------------------------|---------------|
//! | `GET /`                    | [`Root`]      |
//! | `GET /echo/{value}`        | [`Echo`]      |
//! | `GET /user-agent`          | [`UserAgent`] |
//! | `GET /files/{filename}`    | [`Files`]     |
//! | `POST /files/{filename}`   | [`Files`]     |

use crate::{Handler, Request, ResponseWriter, Router, StatusCode};
use std::{
    io,
    path::{Path, PathBuf},
};

/// Builds the standard route table serving files from `directory`.
pub fn router<P: Into<PathBuf>>(directory: P) -> Router {
    let files = Files::new(directory);

    Router::builder()
        .route("GET", "/", Root)
        .route("GET", "/echo/{value}", Echo)
        .route("GET", "/user-agent", UserAgent)
        .route("GET", "/files/{filename}", files.clone())
        .route("POST", "/files/{filename}", files)
        .build()
}

/// `200 OK` with an empty body.
#[derive(Debug, Clone, Copy)]
pub struct Root;

impl Handler for Root {
    async fn handle(&self, _: &Request, resp: &mut ResponseWriter) -> io::Result<()> {
        resp.status(StatusCode::OK).body("");
        Ok(())
    }
}

/// Answers with the `{value}` path segment as plain text.
#[derive(Debug, Clone, Copy)]
pub struct Echo;

impl Handler for Echo {
    async fn handle(&self, req: &Request, resp: &mut ResponseWriter) -> io::Result<()> {
        let value = req.path_value("value").to_owned();

        resp.status(StatusCode::OK)
            .header("Content-Type", "text/plain")
            .body(value);
        Ok(())
    }
}

/// Answers with the request's `User-Agent`, empty if it has none.
#[derive(Debug, Clone, Copy)]
pub struct UserAgent;

impl Handler for UserAgent {
    async fn handle(&self, req: &Request, resp: &mut ResponseWriter) -> io::Result<()> {
        let agent = req.header("User-Agent").unwrap_or("").to_owned();

        resp.header("Content-Type", "text/plain").body(agent);
        Ok(())
    }
}

/// Reads (`GET`) and writes (`POST`) files in one directory.
///
/// - `GET`: `200` with the file as `application/octet-stream`, or `404` with
///   an empty body if it cannot be read.
/// - `POST`: stores the request body, replacing an existing file. `201` on
///   success, otherwise `400` with the error text as the body.
///
/// The `{filename}` value is a single path segment; `.` and `..` and the
/// empty name are refused.
#[derive(Debug, Clone)]
pub struct Files {
    directory: PathBuf,
}

impl Files {
    #[inline]
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path(&self, filename: &str) -> Option<PathBuf> {
        match filename {
            "" | "." | ".." => None,
            name => Some(self.directory.join(name)),
        }
    }

    async fn read(&self, req: &Request, resp: &mut ResponseWriter) {
        let Some(path) = self.path(req.path_value("filename")) else {
            resp.status(StatusCode::NOT_FOUND).body("");
            return;
        };

        match tokio::fs::read(&path).await {
            Ok(content) => {
                resp.status(StatusCode::OK)
                    .header("Content-Type", "application/octet-stream")
                    .body(content);
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "file not readable");
                resp.status(StatusCode::NOT_FOUND).body("");
            }
        }
    }

    async fn write(&self, req: &Request, resp: &mut ResponseWriter) {
        let filename = req.path_value("filename");
        let Some(path) = self.path(filename) else {
            resp.status(StatusCode::BAD_REQUEST)
                .body(format!("invalid file name: {filename:?}"));
            return;
        };

        match tokio::fs::write(&path, req.body()).await {
            Ok(()) => {
                resp.status(StatusCode::CREATED).body("");
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "file not written");
                resp.status(StatusCode::BAD_REQUEST).body(err.to_string());
            }
        }
    }
}

impl Handler for Files {
    async fn handle(&self, req: &Request, resp: &mut ResponseWriter) -> io::Result<()> {
        match req.method() {
            "GET" => self.read(req, resp).await,
            "POST" => self.write(req, resp).await,
            _ => {
                resp.status(StatusCode::NOT_FOUND).body("");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;

    // Routes `raw` through `router` like a connection would.
    async fn call(router: &Router, raw: &[u8]) -> Vec<u8> {
        let mut request = Request::parse(raw).unwrap();
        let mut response = ResponseWriter::new("HTTP/1.1");

        let route = router
            .match_route(request.method(), request.target())
            .unwrap();
        request.bind_pattern(route.pattern().clone());
        route.call(&request, &mut response).await.unwrap();

        response.buffer().to_vec()
    }

    #[tokio::test]
    async fn simple_routes() {
        let router = router("/nonexistent");

        #[rustfmt::skip]
        let cases: [(&[u8], &str); 5] = [
            (
                b"GET / HTTP/1.1\r\n\r\n",
                "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
            ),
            (
                b"GET /echo/abc HTTP/1.1\r\n\r\n",
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 3\r\n\r\nabc",
            ),
            (
                b"GET /echo/ HTTP/1.1\r\n\r\n",
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 0\r\n\r\n",
            ),
            (
                b"GET /user-agent HTTP/1.1\r\nUser-Agent: foobar/1.2.3\r\n\r\n",
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 12\r\n\r\nfoobar/1.2.3",
            ),
            (
                b"GET /user-agent HTTP/1.1\r\n\r\n",
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 0\r\n\r\n",
            ),
        ];

        for (raw, expected) in cases {
            assert_eq!(str_op(&call(&router, raw).await), expected);
        }
    }

    #[tokio::test]
    async fn read_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("foo"), b"Hello, World!").unwrap();
        let router = router(dir.path());

        let found = call(&router, b"GET /files/foo HTTP/1.1\r\n\r\n").await;
        assert_eq!(
            str_op(&found),
            "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: 13\r\n\r\nHello, World!"
        );

        #[rustfmt::skip]
        let missing: [&[u8]; 3] = [
            b"GET /files/nonexistent HTTP/1.1\r\n\r\n",
            b"GET /files/.. HTTP/1.1\r\n\r\n",
            b"GET /files/ HTTP/1.1\r\n\r\n",
        ];
        for raw in missing {
            assert_eq!(
                str_op(&call(&router, raw).await),
                "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n"
            );
        }
    }

    #[tokio::test]
    async fn write_file() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path());

        let created = call(
            &router,
            b"POST /files/new.txt HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello",
        )
        .await;

        assert_eq!(
            str_op(&created),
            "HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n"
        );
        assert_eq!(std::fs::read(dir.path().join("new.txt")).unwrap(), b"hello");

        // Existing files are replaced.
        call(&router, b"POST /files/new.txt HTTP/1.1\r\n\r\nbye").await;
        assert_eq!(std::fs::read(dir.path().join("new.txt")).unwrap(), b"bye");
    }

    #[tokio::test]
    async fn write_errors() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path().join("missing-dir"));

        let failed = call(&router, b"POST /files/a HTTP/1.1\r\n\r\nx").await;
        let (head, body) = split_response(&failed);
        assert!(head.starts_with("HTTP/1.1 400 BadRequest\r\n"));
        assert!(!body.is_empty());

        let refused = call(&router, b"POST /files/. HTTP/1.1\r\n\r\nx").await;
        let (head, body) = split_response(&refused);
        assert!(head.starts_with("HTTP/1.1 400 BadRequest\r\n"));
        assert_eq!(body, b"invalid file name: \".\"");
    }

    #[tokio::test]
    async fn other_methods() {
        let files = Files::new("/tmp");
        let request = Request::parse(b"PUT /files/a HTTP/1.1\r\n\r\n").unwrap();
        let mut response = ResponseWriter::new("HTTP/1.1");

        files.handle(&request, &mut response).await.unwrap();

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(files.directory(), Path::new("/tmp"));
    }
}
