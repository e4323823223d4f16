use mini_web::{decode, handlers, CloseHandle, Server};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    task::JoinHandle,
};

struct TestServer {
    addr: SocketAddr,
    close: CloseHandle,
    task: JoinHandle<Result<(), mini_web::ErrorKind>>,
}

impl TestServer {
    fn start(directory: &Path) -> Self {
        let server = Server::builder()
            .host(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(0)
            .router(handlers::router(directory))
            .build()
            .unwrap();

        Self {
            addr: server.local_addr().unwrap(),
            close: server.close_handle(),
            task: tokio::spawn(server.launch()),
        }
    }

    async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    // One request on a fresh connection that the client closes after sending.
    async fn request(&self, raw: &[u8]) -> Response {
        let mut stream = self.connect().await;
        stream.write_all(raw).await.unwrap();
        stream.shutdown().await.unwrap();

        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.unwrap();
        Response::parse(&bytes).unwrap().0
    }

    async fn stop(self) {
        self.close.close();
        self.task.await.unwrap().unwrap();
    }
}

#[derive(Debug)]
struct Response {
    status_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    // Parses one response framed by Content-Length, returning the bytes used.
    fn parse(bytes: &[u8]) -> Option<(Self, usize)> {
        let end = bytes.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
        let head = std::str::from_utf8(&bytes[..end - 4]).ok()?;

        let mut lines = head.split("\r\n");
        let status_line = lines.next()?.to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(": "))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let length: usize = headers
            .iter()
            .find(|(name, _)| name == "Content-Length")?
            .1
            .parse()
            .ok()?;
        let body = bytes.get(end..end + length)?.to_vec();

        let response = Self {
            status_line,
            headers,
            body,
        };
        Some((response, end + length))
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[tokio::test]
async fn echo() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());

    let resp = server.request(b"GET /echo/abc HTTP/1.1\r\n\r\n").await;

    assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
    assert_eq!(resp.header("Content-Type"), Some("text/plain"));
    assert_eq!(resp.header("Content-Length"), Some("3"));
    assert_eq!(resp.body, b"abc");

    server.stop().await;
}

#[tokio::test]
async fn echo_gzip() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());

    #[rustfmt::skip]
    let cases: [(&str, Option<&str>); 4] = [
        ("gzip",                    Some("gzip")),
        ("invalid-encoding, gzip",  Some("gzip")),
        ("invalid-encoding",        None),
        ("gzip;q=1.0",              None),
    ];

    for (accept, expected) in cases {
        let raw = format!("GET /echo/abc HTTP/1.1\r\nAccept-Encoding: {accept}\r\n\r\n");
        let resp = server.request(raw.as_bytes()).await;

        assert_eq!(resp.header("Content-Encoding"), expected, "{accept}");
        assert_eq!(
            resp.header("Content-Length"),
            Some(resp.body.len().to_string().as_str())
        );
        match expected {
            Some(encoding) => assert_eq!(decode(encoding, &resp.body, usize::MAX).unwrap(), b"abc"),
            None => assert_eq!(resp.body, b"abc"),
        }
    }

    server.stop().await;
}

#[tokio::test]
async fn root_and_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());

    #[rustfmt::skip]
    let cases: [(&[u8], &str); 4] = [
        (b"GET / HTTP/1.1\r\n\r\n",           "HTTP/1.1 200 OK"),
        (b"GET /nonexistent HTTP/1.1\r\n\r\n", "HTTP/1.1 404 Not Found"),
        (b"POST / HTTP/1.1\r\n\r\n",          "HTTP/1.1 404 Not Found"),
        (b"GET /echo/a/b HTTP/1.1\r\n\r\n",    "HTTP/1.1 404 Not Found"),
    ];

    for (raw, status_line) in cases {
        let resp = server.request(raw).await;

        assert_eq!(resp.status_line, status_line);
        assert_eq!(resp.header("Content-Length"), Some("0"));
        assert!(resp.body.is_empty());
    }

    server.stop().await;
}

#[tokio::test]
async fn user_agent() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());

    let resp = server
        .request(b"GET /user-agent HTTP/1.1\r\nHost: localhost\r\nUser-Agent: foobar/1.2.3\r\n\r\n")
        .await;

    assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
    assert_eq!(resp.header("Content-Type"), Some("text/plain"));
    assert_eq!(resp.body, b"foobar/1.2.3");

    server.stop().await;
}

#[tokio::test]
async fn files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("foo"), b"Hello, World!").unwrap();
    let server = TestServer::start(dir.path());

    let resp = server.request(b"GET /files/foo HTTP/1.1\r\n\r\n").await;
    assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
    assert_eq!(resp.header("Content-Type"), Some("application/octet-stream"));
    assert_eq!(resp.body, b"Hello, World!");

    let resp = server.request(b"GET /files/nonexistent HTTP/1.1\r\n\r\n").await;
    assert_eq!(resp.status_line, "HTTP/1.1 404 Not Found");
    assert!(resp.body.is_empty());

    let resp = server
        .request(b"POST /files/upload HTTP/1.1\r\nContent-Type: application/octet-stream\r\nContent-Length: 5\r\n\r\n12345")
        .await;
    assert_eq!(resp.status_line, "HTTP/1.1 201 Created");
    assert_eq!(std::fs::read(dir.path().join("upload")).unwrap(), b"12345");

    let resp = server.request(b"GET /files/upload HTTP/1.1\r\n\r\n").await;
    assert_eq!(resp.body, b"12345");

    server.stop().await;
}

#[tokio::test]
async fn gzip_upload_is_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());

    let body = mini_web::encode("gzip", b"compressed content").unwrap();
    let mut raw = format!(
        "POST /files/packed HTTP/1.1\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    raw.extend_from_slice(&body);

    let resp = server.request(&raw).await;

    assert_eq!(resp.status_line, "HTTP/1.1 201 Created");
    assert_eq!(
        std::fs::read(dir.path().join("packed")).unwrap(),
        b"compressed content"
    );

    server.stop().await;
}

#[tokio::test]
async fn keep_alive() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());
    let mut stream = server.connect().await;

    for value in ["one", "two", "three"] {
        stream
            .write_all(format!("GET /echo/{value} HTTP/1.1\r\n\r\n").as_bytes())
            .await
            .unwrap();

        let mut bytes = Vec::new();
        let resp = loop {
            let mut chunk = [0u8; 1024];
            let n = stream.read(&mut chunk).await.unwrap();
            assert_ne!(n, 0, "connection closed early");
            bytes.extend_from_slice(&chunk[..n]);

            if let Some((resp, _)) = Response::parse(&bytes) {
                break resp;
            }
        };

        assert_eq!(resp.body, value.as_bytes());
        assert_eq!(resp.header("Connection"), None);
    }

    server.stop().await;
}

#[tokio::test]
async fn connection_close() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());
    let mut stream = server.connect().await;

    stream
        .write_all(b"GET /echo/abc HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    // The server closes its side, so this ends without a client shutdown.
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await.unwrap();
    let (resp, used) = Response::parse(&bytes).unwrap();

    assert_eq!(resp.header("Connection"), Some("close"));
    assert_eq!(resp.body, b"abc");
    assert_eq!(used, bytes.len());

    server.stop().await;
}

#[tokio::test]
async fn malformed_request() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());
    let mut stream = server.connect().await;

    stream.write_all(b"NONSENSE\r\n\r\n").await.unwrap();

    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await.unwrap();
    let (resp, _) = Response::parse(&bytes).unwrap();

    assert_eq!(resp.status_line, "HTTP/1.1 400 BadRequest");
    assert_eq!(resp.header("Connection"), Some("close"));

    server.stop().await;
}

#[tokio::test]
async fn concurrent_connections() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());

    // An idle connection must not block others.
    let _idle = server.connect().await;

    let requests = (0..8).map(|i| {
        let raw = format!("GET /echo/{i} HTTP/1.1\r\n\r\n");
        let addr = server.addr;

        tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(raw.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();

            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes).await.unwrap();
            (i, Response::parse(&bytes).unwrap().0)
        })
    });

    for request in requests.collect::<Vec<_>>() {
        let (i, resp) = request.await.unwrap();
        assert_eq!(resp.body, i.to_string().as_bytes());
    }

    server.stop().await;
}
