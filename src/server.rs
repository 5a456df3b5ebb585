//! Connection dispatcher
//!
//! Accepts connections, hands each one to its own worker thread, and reaps
//! finished workers in the background. Workers never share mutable state,
//! so the framing pipeline needs no locks; each worker owns its connection
//! exclusively from accept to close.

use std::io::{self, Read, Write};
use std::iter;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};

use crate::gateway::{Application, Environ, StartResponse};
use crate::http::{self, decode, request, response, Headers, Request, ResponsePipeline};

/// How often the reaper collects finished workers
const REAP_INTERVAL: Duration = Duration::from_millis(250);

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen host; hostnames are resolved
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Accept backlog size
    pub backlog: i32,
    /// Artificial delay before a worker closes its connection, a
    /// concurrency testing hook
    pub worker_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "localhost".to_string(),
            port: 8888,
            backlog: 5,
            worker_delay: Duration::ZERO,
        }
    }
}

/// The listening server
///
/// Owns the application and spawns one worker thread per accepted
/// connection.
pub struct Server<A> {
    config: Config,
    app: Arc<A>,
}

impl<A: Application + 'static> Server<A> {
    /// Create a server over an application
    pub fn new(config: Config, app: A) -> Self {
        Server {
            config,
            app: Arc::new(app),
        }
    }

    /// Bind the listening socket described by the config
    pub fn bind(&self) -> http::Result<TcpListener> {
        let addr = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "listen address did not resolve",
                )
            })?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(self.config.backlog)?;

        Ok(socket.into())
    }

    /// Bind and serve until a fatal accept error
    pub fn serve(&self) -> http::Result<()> {
        let listener = self.bind()?;
        log::info!("serving on {}", listener.local_addr()?);
        self.run(listener)
    }

    /// Accept connections on an already-bound listener
    pub fn run(&self, listener: TcpListener) -> http::Result<()> {
        let reaper = Reaper::start();

        loop {
            let (stream, peer) = match listener.accept() {
                Ok(conn) => conn,
                // A signal can interrupt the blocking accept; retry
                Err(err) if err.raw_os_error() == Some(libc::EINTR) => continue,
                Err(err) => {
                    reaper.stop();
                    return Err(err.into());
                }
            };

            log::debug!("accepted connection from {}", peer);

            let app = Arc::clone(&self.app);
            let config = self.config.clone();
            let worker = thread::spawn(move || {
                if let Err(err) = handle_connection(stream, app.as_ref(), &config) {
                    log::error!("worker for {} failed: {}", peer, err);
                }
            });
            reaper.register(worker);
        }
    }
}

/// Serve one connection end to end
///
/// Terminal outcomes: a normal response, one best-effort 400 on a framing
/// error, one 500 on an application failure, or a propagated error (fatal
/// to this worker only) on a contract violation or transport failure.
fn handle_connection<A: Application>(
    stream: TcpStream,
    app: &A,
    config: &Config,
) -> http::Result<()> {
    let read_half = stream.try_clone()?;
    let mut pipeline = ResponsePipeline::new(stream);

    match decode(read_half) {
        Ok(req) => bridge_request(req, app, config, &mut pipeline)?,
        Err(err @ (http::Error::BadRequest | http::Error::ConnectionClosed)) => {
            log::info!("rejecting connection: {}", err);
            pipeline.set_metadata(response::BAD_REQUEST, Headers::new())?;

            // The peer may already be gone; failing to deliver the 400
            // changes nothing about the outcome
            if let Err(write_err) = pipeline.stream_body(iter::empty()) {
                log::debug!("could not deliver 400: {}", write_err);
            }
        }
        Err(err) => return Err(err),
    }

    if !config.worker_delay.is_zero() {
        thread::sleep(config.worker_delay);
    }

    Ok(())
}

/// Invoke the application and emit whatever it produced
fn bridge_request<A: Application, R: Read, W: Write>(
    req: Request<R>,
    app: &A,
    config: &Config,
    pipeline: &mut ResponsePipeline<W>,
) -> http::Result<()> {
    let (verb, resource, version, headers, mut body) = req.into_parts();
    let content_length = request::declared_content_length(&headers);

    let env = Environ {
        method: verb,
        path: resource,
        protocol: version,
        content_type: headers.get("Content-Type"),
        content_length,
        server_host: config.host.clone(),
        server_port: config.port,
        input: &mut body,
    };

    let mut start = StartResponse::new();

    match app.call(env, &mut start) {
        Ok(chunks) => match start.into_parts() {
            Some((status, response_headers)) => {
                pipeline.set_metadata(status, response_headers)?;
                pipeline.stream_body(chunks)?;
            }
            None => send_failure(
                pipeline,
                "application returned without setting status and headers",
            )?,
        },
        Err(err) => {
            log::error!("application failed: {}", err);
            send_failure(pipeline, &err.to_string())?;
        }
    }

    Ok(())
}

/// Synthesize the fallback 500 with the failure detail as body
fn send_failure<W: Write>(pipeline: &mut ResponsePipeline<W>, detail: &str) -> http::Result<()> {
    pipeline.set_metadata(response::INTERNAL_SERVER_ERROR, Headers::new())?;
    pipeline.stream_body(iter::once(Bytes::copy_from_slice(detail.as_bytes())))
}

/// Background collector for finished workers
///
/// Drains terminated workers on a fixed interval without ever blocking on
/// a specific one, so the accept loop is never stalled by reaping.
struct Reaper {
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    shutdown: Arc<AtomicBool>,
    collector: Option<JoinHandle<()>>,
}

impl Reaper {
    fn start() -> Self {
        let workers: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::default();
        let shutdown = Arc::new(AtomicBool::new(false));

        let collector = {
            let workers = Arc::clone(&workers);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    reap_finished(&workers);
                    thread::park_timeout(REAP_INTERVAL);
                }
                reap_finished(&workers);
            })
        };

        Reaper {
            workers,
            shutdown,
            collector: Some(collector),
        }
    }

    fn register(&self, worker: JoinHandle<()>) {
        self.workers.lock().expect("worker list poisoned").push(worker);
    }

    fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(collector) = self.collector.take() {
            collector.thread().unpark();
            let _ = collector.join();
        }
    }
}

fn reap_finished(workers: &Mutex<Vec<JoinHandle<()>>>) {
    let mut workers = workers.lock().expect("worker list poisoned");
    let mut index = 0;

    while index < workers.len() {
        if workers[index].is_finished() {
            // Cannot block: the thread has already terminated
            let _ = workers.swap_remove(index).join();
        } else {
            index += 1;
        }
    }
}
