//! Connection server: one worker thread per admitted connection, at most
//! `max_workers` of them at a time.

pub mod http;

use std::{
    io::{BufReader, Write},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream},
    path::{Path, PathBuf},
    sync::{
        Arc, Condvar, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::{
    error::{Error, Result},
    sql::engine::QueryEngine,
    storage::source::{FileSource, Source},
};

pub struct ServerConfig {
    /// Listen address, `host:port`
    pub addr: String,
    /// Upper bound on concurrently handled connections
    pub max_workers: usize,
    /// Directory static files are served from
    pub doc_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".into(),
            max_workers: 20,
            doc_root: PathBuf::from("."),
        }
    }
}

/// Active worker count with a condition variable signalled when a worker
/// finishes
pub struct Admission {
    max: usize,
    counts: Mutex<Counts>,
    freed: Condvar,
}

#[derive(Default)]
struct Counts {
    active: usize,
    peak: usize,
}

impl Admission {
    fn new(max: usize) -> Self {
        Self {
            max: max.max(1),
            counts: Mutex::new(Counts::default()),
            freed: Condvar::new(),
        }
    }

    /// Number of workers currently admitted
    pub fn active(&self) -> Result<usize> {
        Ok(self.counts.lock()?.active)
    }

    /// Highest number of workers ever admitted at once
    pub fn peak(&self) -> Result<usize> {
        Ok(self.counts.lock()?.peak)
    }

    /// Blocks while every slot is taken. Returns false once `stopping` is set.
    fn wait_for_slot(&self, stopping: &AtomicBool) -> Result<bool> {
        let mut counts = self.counts.lock()?;
        while counts.active >= self.max && !stopping.load(Ordering::SeqCst) {
            counts = self.freed.wait(counts)?;
        }
        Ok(!stopping.load(Ordering::SeqCst))
    }

    fn acquire(self: &Arc<Self>) -> Result<Slot> {
        let mut counts = self.counts.lock()?;
        counts.active += 1;
        counts.peak = counts.peak.max(counts.active);
        Ok(Slot(self.clone()))
    }

    fn wake_all(&self) -> Result<()> {
        let _counts = self.counts.lock()?;
        self.freed.notify_all();
        Ok(())
    }
}

/// An admitted worker's slot; dropping it frees the slot and wakes the
/// accept loop
struct Slot(Arc<Admission>);

impl Drop for Slot {
    fn drop(&mut self) {
        let mut counts = self.0.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.active -= 1;
        self.0.freed.notify_one();
    }
}

pub struct ConnectionServer<S: Source = FileSource> {
    listener: TcpListener,
    engine: QueryEngine<S>,
    doc_root: PathBuf,
    admission: Arc<Admission>,
    stopping: Arc<AtomicBool>,
}

impl<S: Source + 'static> ConnectionServer<S> {
    pub fn bind(config: ServerConfig, engine: QueryEngine<S>) -> Result<Self> {
        let listener = TcpListener::bind(&config.addr)?;
        info!(
            addr = %listener.local_addr()?,
            max_workers = config.max_workers,
            "listening"
        );
        Ok(Self {
            listener,
            engine,
            doc_root: config.doc_root,
            admission: Arc::new(Admission::new(config.max_workers)),
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn admission(&self) -> &Arc<Admission> {
        &self.admission
    }

    /// Runs the accept loop on a new thread
    pub fn spawn(self) -> Result<ServerHandle<S>> {
        let handle = ServerHandle {
            addr: self.local_addr()?,
            engine: self.engine.clone(),
            admission: self.admission.clone(),
            stopping: self.stopping.clone(),
            thread: None,
        };
        let thread = thread::Builder::new()
            .name("csvdb-accept".into())
            .spawn(move || self.run())?;
        Ok(ServerHandle {
            thread: Some(thread),
            ..handle
        })
    }

    /// Accepts connections until shut down, then joins every worker
    pub fn run(self) -> Result<()> {
        let mut workers: Vec<Worker> = Vec::new();
        let mut failures: u32 = 0;
        loop {
            if !self.admission.wait_for_slot(&self.stopping)? {
                break;
            }
            let (stream, peer) = match self.listener.accept() {
                Ok(conn) => {
                    failures = 0;
                    conn
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    let delay = accept_backoff(failures);
                    warn!(error = %err, retry_in = ?delay, "accept failed");
                    thread::sleep(delay);
                    continue;
                }
            };
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            let control = match stream.try_clone() {
                Ok(control) => control,
                Err(err) => {
                    warn!(%peer, error = %err, "dropping connection");
                    continue;
                }
            };

            let slot = self.admission.acquire()?;
            debug!(%peer, "connection admitted");
            let engine = self.engine.clone();
            let doc_root = self.doc_root.clone();
            let handle = thread::Builder::new()
                .name("csvdb-worker".into())
                .spawn(move || {
                    let _slot = slot;
                    if let Err(err) = handle_connection(&stream, &engine, &doc_root) {
                        warn!(%peer, error = %err, "connection failed");
                    }
                    // `control` keeps the socket open; close the connection itself
                    let _ = stream.shutdown(Shutdown::Both);
                })?;
            workers.push(Worker { handle, control });
            reap(&mut workers);
        }

        info!(workers = workers.len(), "accept loop stopped, joining workers");
        // A worker still waiting for its request sees end of input;
        // one already answering can still write its response
        for worker in &workers {
            let _ = worker.control.shutdown(Shutdown::Read);
        }
        for worker in workers {
            if worker.handle.join().is_err() {
                error!("worker panicked");
            }
        }
        Ok(())
    }
}

/// A running worker and a handle on its connection
struct Worker {
    handle: JoinHandle<()>,
    control: TcpStream,
}

/// Delay before retrying after `failures` consecutive accept errors
fn accept_backoff(failures: u32) -> Duration {
    let millis = 10u64.saturating_mul(1 << failures.saturating_sub(1).min(10));
    Duration::from_millis(millis.min(1000))
}

/// Joins the workers that already finished
fn reap(workers: &mut Vec<Worker>) {
    let (done, running): (Vec<_>, Vec<_>) =
        workers.drain(..).partition(|w| w.handle.is_finished());
    *workers = running;
    for worker in done {
        if worker.handle.join().is_err() {
            error!("worker panicked");
        }
    }
}

/// Reads one request and writes one response
fn handle_connection<S: Source>(
    stream: &TcpStream,
    engine: &QueryEngine<S>,
    doc_root: &Path,
) -> Result<()> {
    let mut reader = BufReader::new(stream);
    let Some(request) = http::read_request(&mut reader)? else {
        return Ok(());
    };
    debug!(method = %request.method, target = %request.target, "request");

    let response = match request.query() {
        Some(query) => {
            let body = match query.and_then(|sql| engine.execute(&sql)) {
                Ok(result) => result.to_string(),
                Err(err) => {
                    debug!(error = %err, "query failed");
                    format!("Error: {}\n", err)
                }
            };
            http::response("200 OK", "text/plain", body.as_bytes())
        }
        None => http::static_file(doc_root, &request.target),
    };
    let mut writer = stream;
    writer.write_all(&response)?;
    writer.flush()?;
    Ok(())
}

/// Control handle for a server started with `ConnectionServer::spawn`
pub struct ServerHandle<S: Source = FileSource> {
    addr: SocketAddr,
    engine: QueryEngine<S>,
    admission: Arc<Admission>,
    stopping: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl<S: Source> ServerHandle<S> {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn admission(&self) -> &Arc<Admission> {
        &self.admission
    }

    /// Stops accepting, cancels parked WAIT queries and joins every thread
    pub fn shutdown(mut self) -> Result<()> {
        info!(addr = %self.addr, "shutting down");
        self.stopping.store(true, Ordering::SeqCst);
        self.engine.shutdown()?;
        self.admission.wake_all()?;
        // Unblock a pending accept; the loop sees the stop flag and drops it
        let _ = TcpStream::connect(wake_addr(self.addr));

        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| Error::Internal("accept thread panicked".into()))?,
            None => Ok(()),
        }
    }
}

/// The address to connect to in order to reach a listener bound to `addr`
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => (Ipv4Addr::LOCALHOST, addr.port()).into(),
        IpAddr::V6(ip) if ip.is_unspecified() => (Ipv6Addr::LOCALHOST, addr.port()).into(),
        _ => addr,
    }
}
