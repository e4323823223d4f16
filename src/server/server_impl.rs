use crate::{
    errors::ErrorKind,
    http::{request::Request, response::ResponseWriter, router::Router},
    limits::{ReqLimits, RespLimits, ServerLimits},
    server::connection::HttpConnection,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    future::Future,
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    pin::Pin,
    sync::Arc,
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
};
use tracing::Instrument;

/// A trait for route handlers.
///
/// A handler receives the parsed request, with the matched route already
/// bound so [`Request::path_value`] works, and fills in the response.
/// Returning `Err` is fatal to the connection: nothing is sent and the
/// socket is closed. If the handler returns `Ok` without writing a body,
/// an empty body is sent with the status and headers it did set.
///
/// # Examples
///
/// ```
/// use mini_web::{Handler, Request, ResponseWriter, StatusCode};
/// use std::io;
///
/// struct Echo;
///
/// impl Handler for Echo {
///     async fn handle(&self, req: &Request, resp: &mut ResponseWriter) -> io::Result<()> {
///         let value = req.path_value("value").to_owned();
///
///         resp.status(StatusCode::OK)
///             .header("Content-Type", "text/plain")
///             .body(value);
///         Ok(())
///     }
/// }
/// ```
pub trait Handler: Sync + Send + 'static {
    /// Processes one request.
    fn handle(
        &self,
        request: &Request,
        response: &mut ResponseWriter,
    ) -> impl Future<Output = io::Result<()>> + Send;
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// Object-safe form of `Handler`, so a router can hold different handler types.
pub(crate) trait DynHandler: Sync + Send + 'static {
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut ResponseWriter,
    ) -> BoxFuture<'a, io::Result<()>>;
}

impl<H: Handler> DynHandler for H {
    #[inline]
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut ResponseWriter,
    ) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(self.handle(request, response))
    }
}

/// An HTTP server: one listening socket, one task per accepted connection.
///
/// # Examples
///
/// ```no_run
/// use mini_web::{Handler, Request, ResponseWriter, Router, Server, StatusCode};
/// use std::io;
///
/// struct Hello;
///
/// impl Handler for Hello {
///     async fn handle(&self, _: &Request, resp: &mut ResponseWriter) -> io::Result<()> {
///         resp.status(StatusCode::OK).body("Hello world!");
///         Ok(())
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), mini_web::ErrorKind> {
///     Server::builder()
///         .port(4221)
///         .router(Router::builder().route("GET", "/", Hello).build())
///         .build()?
///         .launch()
///         .await
/// }
/// ```
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
    limits: AllLimits,

    close_sender: Arc<watch::Sender<bool>>,
    closed: watch::Receiver<bool>,
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            listener: None,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: None,
            router: None,

            server_limits: None,
            request_limits: None,
            response_limits: None,
        }
    }

    /// Address the listening socket is bound to.
    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns a handle that stops [`launch`](Self::launch) from another task.
    #[inline]
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            sender: self.close_sender.clone(),
        }
    }

    /// Accepts connections until the server is closed.
    ///
    /// Every accepted connection runs in its own task and serves requests
    /// until the client asks for `Connection: close`, disconnects, or an
    /// error occurs.
    ///
    /// # Errors
    ///
    /// A failed `accept` stops the server with [`ErrorKind::Accept`].
    /// Connection-level errors are logged and never reach this method.
    pub async fn launch(mut self) -> Result<(), ErrorKind> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "server listening");

        loop {
            let closed = *self.closed.borrow_and_update();
            if closed {
                break;
            }

            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.map_err(|err| {
                        tracing::error!(error = %err, "error accepting connection");
                        ErrorKind::Accept(err)
                    })?;

                    self.spawn_connection(stream, peer);
                }
                changed = self.closed.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        // The listener is dropped here, in-flight connections keep running.
        tracing::info!("server closed");
        Ok(())
    }

    fn spawn_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        let mut connection = HttpConnection::new(self.router.clone(), &self.limits);
        let span = tracing::info_span!("connection", peer = %peer);

        tokio::spawn(
            async move {
                tracing::debug!("connection accepted");
                if let Err(err) = stream.set_nodelay(true) {
                    tracing::debug!(error = %err, "failed to set TCP_NODELAY");
                }

                match connection.run(&mut stream).await {
                    Ok(()) => tracing::debug!("connection closed"),
                    Err(err) => tracing::warn!(error = %err, "connection closed with error"),
                }
            }
            .instrument(span),
        );
    }
}

/// Stops a running [`Server`].
///
/// Closing only stops new accepts and releases the listening socket.
/// Connections that are already open finish on their own.
///
/// # Examples
///
/// ```no_run
/// # use mini_web::{Router, Server};
/// #[tokio::main]
/// async fn main() {
///     let server = Server::builder()
///         .port(4221)
///         .router(Router::builder().build())
///         .build()
///         .unwrap();
///
///     let close = server.close_handle();
///     tokio::spawn(async move {
///         let _ = tokio::signal::ctrl_c().await;
///         close.close();
///     });
///
///     server.launch().await.unwrap();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CloseHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CloseHandle {
    /// Signals the server to stop. Calling it more than once is harmless.
    #[inline]
    pub fn close(&self) {
        self.sender.send_replace(true);
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        *self.sender.borrow()
    }
}

// Builder

/// Builder for configuring and creating [`Server`] instances.
///
/// A router and either a ready listener or a port are required.
#[derive(Debug)]
pub struct ServerBuilder {
    listener: Option<TcpListener>,
    host: IpAddr,
    port: Option<u16>,
    router: Option<Router>,

    server_limits: Option<ServerLimits>,
    request_limits: Option<ReqLimits>,
    response_limits: Option<RespLimits>,
}

impl ServerBuilder {
    /// Uses an already bound listener. Takes precedence over [`port`](Self::port).
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Address to bind when no listener is given (default: `0.0.0.0`).
    #[inline(always)]
    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Port to bind when no listener is given. `0` picks a free port.
    #[inline(always)]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the route table.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.response_limits = Some(limits);
        self
    }

    /// Finalizes the builder, binding the listening socket if needed.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Bind`] if the socket cannot be created, bound or put
    /// into listening mode.
    ///
    /// # Panics
    ///
    /// Error messages:
    /// - ``The `router` method must be called to create``
    /// - ``The `listener` or `port` method must be called to create``
    ///
    /// Binding a port also panics outside of a tokio runtime.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Result<Server, ErrorKind> {
        let router = self
            .router
            .expect("The `router` method must be called to create");
        let limits = (
            self.server_limits.unwrap_or_default(),
            self.request_limits.unwrap_or_default(),
            self.response_limits.unwrap_or_default(),
        );

        let listener = match self.listener {
            Some(listener) => listener,
            None => {
                let port = self
                    .port
                    .expect("The `listener` or `port` method must be called to create");

                bind(SocketAddr::new(self.host, port), limits.0.backlog)?
            }
        };

        let (close_sender, closed) = watch::channel(false);

        Ok(Server {
            listener,
            router: Arc::new(router),
            limits,

            close_sender: Arc::new(close_sender),
            closed,
        })
    }
}

fn bind(addr: SocketAddr, backlog: i32) -> Result<TcpListener, ErrorKind> {
    let listen = || -> io::Result<TcpListener> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(backlog)?;

        TcpListener::from_std(socket.into())
    };

    listen().map_err(|source| {
        tracing::error!(%addr, error = %source, "failed to bind");
        ErrorKind::Bind { addr, source }
    })
}

pub(crate) type AllLimits = (ServerLimits, ReqLimits, RespLimits);
