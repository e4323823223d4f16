use crate::{
    errors::ErrorKind,
    http::{
        encoding::Encodings,
        request::{Parser, Request},
        response::ResponseWriter,
        router::Router,
        types::StatusCode,
    },
    limits::{ReqLimits, RespLimits},
    server::server_impl::AllLimits,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Request loop of one client connection.
///
/// Requests are handled strictly one after another: read a frame, parse it,
/// route it, write the response, repeat until the client sends
/// `Connection: close`, disconnects, or something fails.
pub(crate) struct HttpConnection {
    router: Arc<Router>,
    parser: Parser,

    protocol: &'static str,
    req_limits: ReqLimits,
    resp_limits: RespLimits,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(router: Arc<Router>, limits: &AllLimits) -> Self {
        Self {
            router,
            parser: Parser::new(&limits.1),

            protocol: limits.0.protocol,
            req_limits: limits.1.clone(),
            resp_limits: limits.2.clone(),
        }
    }

    /// Serves the connection until it closes.
    ///
    /// A clean disconnect between requests is `Ok`. If the request could not
    /// be parsed, a bare `400` with `Connection: close` is written first.
    pub(crate) async fn run<S>(&mut self, stream: &mut S) -> Result<(), ErrorKind>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.impl_run(stream).await {
            Err(err) if err.is_parse_error() => {
                let _ = stream.write_all(err.as_http()).await;
                Err(err)
            }
            result => result,
        }
    }

    async fn impl_run<S>(&mut self, stream: &mut S) -> Result<(), ErrorKind>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let Some(frame) = self.parser.read_frame(stream).await? else {
                return Ok(());
            };
            tracing::trace!(request = %String::from_utf8_lossy(&frame), "request received");

            let mut request = Request::parse_with_limits(&frame, &self.req_limits)?;
            let mut response = ResponseWriter::with_limits(self.protocol, &self.resp_limits);

            let close = request.header("Connection") == Some("close");
            if close {
                response.header("Connection", "close");
            }

            self.dispatch(&mut request, &mut response).await?;
            if !response.is_complete() {
                response.body("");
            }

            tracing::trace!(response = %String::from_utf8_lossy(response.buffer()), "response sent");
            stream.write_all(response.buffer()).await?;

            if close {
                return Ok(());
            }
        }
    }

    async fn dispatch(
        &self,
        request: &mut Request,
        response: &mut ResponseWriter,
    ) -> Result<(), ErrorKind> {
        let encoding = request
            .header("Accept-Encoding")
            .and_then(|raw| Encodings::parse(raw).get_encoding());
        if let Some(encoding) = encoding {
            response.header("Content-Encoding", encoding);
        }

        let Some(route) = self.router.match_route(request.method(), request.target()) else {
            tracing::debug!(method = request.method(), target = request.target(), "no route");
            response.status(StatusCode::NOT_FOUND).body("");
            return Ok(());
        };

        request.bind_pattern(route.pattern().clone());
        route
            .call(request, response)
            .await
            .map_err(ErrorKind::Handler)
    }
}
