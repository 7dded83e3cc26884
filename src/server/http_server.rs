use super::service::AppService;
use may::coroutine::{self, JoinHandle};
use may::net::TcpListener;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// The HTTP server: binds the listening socket and runs the accept loop on a
/// coroutine, spawning one connection coroutine per accepted stream.
pub struct HttpServer(pub AppService);

/// Handle to a running HTTP server
///
/// Provides methods for waiting until the server is ready, stopping it
/// gracefully, or joining the acceptor coroutine.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the server is bound to (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// Polls the server address by attempting TCP connections until
    /// successful. Useful in tests to ensure the server is fully started
    /// before sending requests.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if the server doesn't become ready within ~250ms
    /// (50 attempts x 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop the server by cancelling the acceptor coroutine.
    ///
    /// In-flight connection coroutines finish their current request;
    /// no new connections are accepted. Consumes the handle.
    pub fn stop(self) {
        // SAFETY: cancel() is marked unsafe by the may runtime. The acceptor
        // coroutine holds no locks and owns only the listener, which is
        // dropped on cancellation; shutdown is the intended behavior here.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    /// Block until the acceptor coroutine finishes.
    ///
    /// The server runs indefinitely unless stopped externally.
    ///
    /// # Errors
    ///
    /// Returns an error if the acceptor panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl HttpServer {
    /// Start the HTTP server on the given address
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to bind to (e.g., `"0.0.0.0:8080"` or `"127.0.0.1:3000"`)
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the port cannot be
    /// bound. A bind failure is fatal: the server never starts half-way.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let listener = TcpListener::bind(addr)?;
        let local = listener.local_addr()?;
        let service = self.0;
        info!(addr = %local, "listener bound");

        // SAFETY: coroutine spawn is marked unsafe by the may runtime; the
        // closure is 'static and owns everything it touches (listener and a
        // cloned service handle per connection).
        let handle = unsafe {
            coroutine::Builder::new()
                .name("acceptor".to_string())
                .spawn(move || accept_loop(&listener, &service))
        }?;
        Ok(ServerHandle { addr: local, handle })
    }
}

/// Accept connections forever, one coroutine per connection.
///
/// An accept error on an individual connection is logged and the loop
/// continues; it is never fatal to the process.
fn accept_loop(listener: &TcpListener, service: &AppService) {
    let stack_size = service.config.stack_size;
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                let svc = service.clone();
                // SAFETY: same contract as the acceptor spawn above; the
                // connection coroutine owns its stream and service clone.
                let spawned = unsafe {
                    coroutine::Builder::new()
                        .stack_size(stack_size)
                        .spawn(move || svc.handle_connection(stream))
                };
                if let Err(e) = spawned {
                    error!(peer = %peer, error = %e, "failed to spawn connection coroutine");
                }
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
            }
        }
    }
}
