use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError, mpsc as std_mpsc},
    thread::{self, JoinHandle},
    time::Duration,
};

use tokio::{
    runtime::{Builder, Handle},
    sync::{Mutex as AsyncMutex, oneshot},
};
use tracing::{debug, info, instrument, warn};

use super::{ControlConnection, ControlError, Connector, Endpoint};

/// How long [`ClientSession::stop`] waits for the connection to close.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

struct LoopThread {
    handle: Handle,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

struct Active<T> {
    endpoint: Endpoint,
    connection: T,
}

struct SessionCore<C: Connector> {
    connector: C,
    active: AsyncMutex<Option<Active<C::Connection>>>,
}

impl<C: Connector> SessionCore<C> {
    async fn run<T, F, Fut>(&self, endpoint: &Endpoint, work: F) -> Result<T, ControlError>
    where
        F: Fn(C::Connection) -> Fut,
        Fut: Future<Output = Result<T, ControlError>>,
    {
        let mut active = self.active.lock().await;
        let connection = self.ensure(&mut active, endpoint).await?;

        match work(connection).await {
            Err(err) if err.is_connection_error() => {
                info!("Music Assistant connection lost ({err}), reconnecting");
                Self::close(&mut active).await;

                let connection = self.ensure(&mut active, endpoint).await?;
                let result = work(connection).await;
                if matches!(&result, Err(err) if err.is_connection_error()) {
                    Self::close(&mut active).await;
                }
                result
            }
            result => result,
        }
    }

    async fn ensure(
        &self,
        active: &mut Option<Active<C::Connection>>,
        endpoint: &Endpoint,
    ) -> Result<C::Connection, ControlError> {
        if !endpoint.is_configured() {
            return Err(ControlError::NotConfigured);
        }
        if let Some(current) = active.as_ref() {
            if current.endpoint == *endpoint && current.connection.is_connected() {
                return Ok(current.connection.clone());
            }
        }

        Self::close(active).await;
        debug!(server = endpoint.server_url(), "Connecting to Music Assistant");
        let connection = self.connector.connect(endpoint).await?;
        *active = Some(Active {
            endpoint: endpoint.clone(),
            connection: connection.clone(),
        });
        Ok(connection)
    }

    async fn close(active: &mut Option<Active<C::Connection>>) {
        if let Some(previous) = active.take() {
            previous.connection.close().await;
        }
    }
}

/// Serialized access to one Music Assistant connection.
///
/// All work runs on a dedicated thread with its own single-threaded
/// runtime, one operation at a time. The connection is reused while the
/// endpoint is unchanged and the socket is alive. A unit of work that fails
/// with a connection error is retried once on a fresh connection.
///
/// The loop thread starts on first use and again after [`stop`](Self::stop).
pub struct ClientSession<C: Connector> {
    core: Arc<SessionCore<C>>,
    worker: Mutex<Option<LoopThread>>,
}

impl<C: Connector> ClientSession<C> {
    /// Creates an idle session.
    pub fn new(connector: C) -> Self {
        Self {
            core: Arc::new(SessionCore {
                connector,
                active: AsyncMutex::new(None),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Whether the loop thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Runs `work` against a connection for `endpoint` and blocks for the
    /// result.
    ///
    /// Must not be called from inside an async runtime or from within
    /// `work` itself; use [`run_async`](Self::run_async) there.
    ///
    /// # Errors
    /// Returns [`ControlError::NotConfigured`] for an empty server URL, the
    /// connect or work error otherwise, and [`ControlError::SessionStopped`]
    /// if the session stopped while the work was pending.
    pub fn run<T, F, Fut>(&self, endpoint: &Endpoint, work: F) -> Result<T, ControlError>
    where
        T: Send + 'static,
        F: Fn(C::Connection) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ControlError>> + Send + 'static,
    {
        self.submit(endpoint, work)?
            .blocking_recv()
            .unwrap_or(Err(ControlError::SessionStopped))
    }

    /// Async counterpart of [`run`](Self::run) for callers on another
    /// runtime.
    ///
    /// # Errors
    /// Same as [`run`](Self::run).
    pub async fn run_async<T, F, Fut>(&self, endpoint: &Endpoint, work: F) -> Result<T, ControlError>
    where
        T: Send + 'static,
        F: Fn(C::Connection) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ControlError>> + Send + 'static,
    {
        self.submit(endpoint, work)?
            .await
            .unwrap_or(Err(ControlError::SessionStopped))
    }

    /// Points the session at a new endpoint without waiting.
    ///
    /// An unconfigured endpoint closes the current connection; otherwise a
    /// connection is opened in the background. Failures are only logged.
    pub fn set_server(&self, endpoint: &Endpoint) {
        let handle = match self.handle() {
            Ok(handle) => handle,
            Err(err) => {
                warn!("Cannot switch Music Assistant server: {err}");
                return;
            }
        };
        let core = Arc::clone(&self.core);
        let endpoint = endpoint.clone();

        handle.spawn(async move {
            let mut active = core.active.lock().await;
            if !endpoint.is_configured() {
                SessionCore::<C>::close(&mut active).await;
                return;
            }
            if let Err(err) = core.ensure(&mut active, &endpoint).await {
                debug!(
                    server = endpoint.server_url(),
                    "Music Assistant connect failed: {err}"
                );
            }
        });
    }

    /// Closes the connection and joins the loop thread.
    ///
    /// Waits up to [`SHUTDOWN_TIMEOUT`] for the close; pending work is then
    /// abandoned and its callers receive [`ControlError::SessionStopped`].
    #[instrument(skip(self))]
    pub fn stop(&self) {
        let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        let core = Arc::clone(&self.core);
        let (done_tx, done_rx) = std_mpsc::channel();
        worker.handle.spawn(async move {
            let mut active = core.active.lock().await;
            SessionCore::<C>::close(&mut active).await;
            let _ = done_tx.send(());
        });
        if done_rx.recv_timeout(SHUTDOWN_TIMEOUT).is_err() {
            warn!("Timed out closing the Music Assistant connection");
        }

        let _ = worker.shutdown.send(());
        if worker.thread.join().is_err() {
            warn!("Music Assistant client thread panicked");
        }

        if let Ok(mut active) = self.core.active.try_lock() {
            active.take();
        }
        debug!("Music Assistant client session stopped");
    }

    fn submit<T, F, Fut>(
        &self,
        endpoint: &Endpoint,
        work: F,
    ) -> Result<oneshot::Receiver<Result<T, ControlError>>, ControlError>
    where
        T: Send + 'static,
        F: Fn(C::Connection) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ControlError>> + Send + 'static,
    {
        let handle = self.handle()?;
        let core = Arc::clone(&self.core);
        let endpoint = endpoint.clone();
        let (tx, rx) = oneshot::channel();

        handle.spawn(async move {
            let _ = tx.send(core.run(&endpoint, work).await);
        });
        Ok(rx)
    }

    fn handle(&self) -> Result<Handle, ControlError> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = worker.as_ref() {
            return Ok(running.handle.clone());
        }

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| ControlError::Runtime(err.to_string()))?;
        let handle = runtime.handle().clone();
        let (shutdown, stopped) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name("ma-client".to_string())
            .spawn(move || {
                runtime.block_on(async {
                    let _ = stopped.await;
                });
            })
            .map_err(|err| ControlError::Runtime(err.to_string()))?;

        *worker = Some(LoopThread {
            handle: handle.clone(),
            shutdown,
            thread,
        });
        Ok(handle)
    }
}

impl<C: Connector> Drop for ClientSession<C> {
    fn drop(&mut self) {
        self.stop();
    }
}
