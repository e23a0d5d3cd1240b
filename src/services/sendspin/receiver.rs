use std::{
    sync::{Arc, Mutex, PoisonError, RwLock},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use ::sendspin::{protocol::messages::Message as WireMessage, sync::ClockSync};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, instrument, warn};

use super::{
    AudioChunk, ClientIdentity, ConnectionState, ReceiverEvent, ReceiverListener, ReceiverState,
    SendspinError, ServerMessage, StreamDispatcher, TimeSample, client_hello, client_state,
    client_time, encode, endpoint_url, now_micros, sendspin_url,
};
use crate::services::audio::{DEFAULT_VOLUME, SupportedFormat};

/// Delay between connection attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(3);
/// Interval between state reports.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
/// Interval between clock synchronization requests.
pub const TIME_SYNC_INTERVAL: Duration = Duration::from_secs(5);
/// How long [`SendspinReceiver::stop`] waits for the loop to exit.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

const STOP_POLL: Duration = Duration::from_millis(10);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Supplies the formats to advertise on each connect.
pub type FormatSource = Arc<dyn Fn() -> Vec<SupportedFormat> + Send + Sync>;

/// Commands from the owning thread to the connection loop
#[derive(Debug)]
enum ReceiverCommand {
    /// Send a `client/state` report if connected
    ReportState,
}

struct Running {
    stop: watch::Sender<bool>,
    commands: mpsc::UnboundedSender<ReceiverCommand>,
    thread: JoinHandle<()>,
}

/// Sendspin player client.
///
/// Runs its connection loop on a dedicated thread with a single-threaded
/// runtime, reconnecting with a fixed delay until stopped. Events go to one
/// listener on that thread.
pub struct SendspinReceiver {
    identity: ClientIdentity,
    state: ReceiverState,
    listener: Arc<dyn ReceiverListener>,
    formats: RwLock<Option<FormatSource>>,
    endpoint: Mutex<String>,
    running: Mutex<Option<Running>>,
    retry_delay: Duration,
    heartbeat_interval: Duration,
    stop_timeout: Duration,
}

impl SendspinReceiver {
    /// Creates a stopped receiver.
    pub fn new(identity: ClientIdentity, listener: Arc<dyn ReceiverListener>) -> Self {
        Self {
            identity,
            state: ReceiverState::new(DEFAULT_VOLUME),
            listener,
            formats: RwLock::new(None),
            endpoint: Mutex::new(String::new()),
            running: Mutex::new(None),
            retry_delay: RETRY_DELAY,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            stop_timeout: STOP_TIMEOUT,
        }
    }

    /// Overrides the retry delay and heartbeat interval.
    pub fn with_timing(mut self, retry_delay: Duration, heartbeat_interval: Duration) -> Self {
        self.retry_delay = retry_delay;
        self.heartbeat_interval = heartbeat_interval;
        self
    }

    /// Overrides how long [`stop`](Self::stop) waits for the loop.
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    /// Sets the source of advertised formats, consulted on every connect.
    pub fn set_format_source(&self, source: FormatSource) {
        *self.formats.write().unwrap_or_else(PoisonError::into_inner) = Some(source);
    }

    /// Client identity sent in the hello.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Watchable receiver state.
    pub fn state(&self) -> &ReceiverState {
        &self.state
    }

    /// Websocket URL of the last start, empty before the first.
    pub fn endpoint(&self) -> String {
        self.endpoint
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the connection loop is running.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|running| !running.thread.is_finished())
    }

    /// Starts the connection loop for a Music Assistant server URL.
    ///
    /// The Sendspin endpoint is derived from the server host. Does nothing
    /// when the loop is already running.
    ///
    /// # Errors
    /// Returns error when the URL is invalid or the thread cannot start.
    pub fn start(&self, server_url: &str) -> Result<(), SendspinError> {
        self.start_endpoint(&sendspin_url(server_url)?)
    }

    /// Starts the connection loop for a full `ws://` or `wss://` URL.
    ///
    /// Does nothing when the loop is already running.
    ///
    /// # Errors
    /// Returns error when the URL is invalid or the thread cannot start.
    #[instrument(skip(self))]
    pub fn start_endpoint(&self, url: &str) -> Result<(), SendspinError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running
            .as_ref()
            .is_some_and(|running| !running.thread.is_finished())
        {
            return Ok(());
        }

        let url = endpoint_url(url)?;
        self.endpoint
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone_from(&url);

        let (stop_tx, stop_rx) = watch::channel(false);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let worker = Worker {
            url,
            identity: self.identity.clone(),
            state: self.state.clone(),
            listener: Arc::clone(&self.listener),
            formats: self
                .formats
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            dispatcher: StreamDispatcher::new(),
            clock: ClockSync::new(),
            retry_delay: self.retry_delay,
            heartbeat_interval: self.heartbeat_interval,
        };

        let thread = thread::Builder::new()
            .name("sendspin".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        warn!("Sendspin client stopped: {err}");
                        return;
                    }
                };
                runtime.block_on(worker.run(stop_rx, command_rx));
            })
            .map_err(|err| SendspinError::StartFailed(err.to_string()))?;

        *running = Some(Running {
            stop: stop_tx,
            commands: command_tx,
            thread,
        });
        Ok(())
    }

    /// Stops the connection loop and waits for it to exit.
    ///
    /// The wait is bounded by the stop timeout. A loop still busy inside
    /// its listener after that is detached and exits on its own once the
    /// listener returns.
    pub fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return;
        };

        let _ = running.stop.send(true);
        let deadline = Instant::now() + self.stop_timeout;
        while !running.thread.is_finished() && Instant::now() < deadline {
            thread::sleep(STOP_POLL);
        }
        if running.thread.is_finished() {
            if running.thread.join().is_err() {
                warn!("Sendspin receiver thread panicked");
            }
        } else {
            warn!(
                "Sendspin receiver did not stop within {:?}, detaching it",
                self.stop_timeout
            );
        }
        self.state.connection.set(ConnectionState::Disconnected);
        self.state.stream.set(None);
        debug!("Sendspin receiver stopped");
    }

    /// Stops and starts again with the last endpoint.
    ///
    /// Used after the local output changed, so the new formats are
    /// advertised.
    ///
    /// # Errors
    /// Returns error when the loop cannot be restarted.
    pub fn restart(&self) -> Result<(), SendspinError> {
        let url = self.endpoint();
        self.stop();
        if url.is_empty() {
            return Ok(());
        }
        self.start_endpoint(&url)
    }

    /// Sets the volume, `0.0..=1.0`, and reports it.
    pub fn set_volume(&self, volume: f64) {
        self.state.set_volume(volume);
        self.report_state();
    }

    /// Sets the volume in percent and reports it.
    pub fn set_volume_percent(&self, percent: i64) {
        self.state.set_volume_percent(percent);
        self.report_state();
    }

    /// Sets the mute flag and reports it.
    pub fn set_muted(&self, muted: bool) {
        self.state.muted.set(muted);
        self.report_state();
    }

    fn report_state(&self) {
        if !self.state.is_connected() {
            return;
        }
        if let Some(running) = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            let _ = running.commands.send(ReceiverCommand::ReportState);
        }
    }
}

impl Drop for SendspinReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    url: String,
    identity: ClientIdentity,
    state: ReceiverState,
    listener: Arc<dyn ReceiverListener>,
    formats: Option<FormatSource>,
    dispatcher: StreamDispatcher,
    clock: ClockSync,
    retry_delay: Duration,
    heartbeat_interval: Duration,
}

impl Worker {
    async fn run(
        mut self,
        mut stop: watch::Receiver<bool>,
        mut commands: mpsc::UnboundedReceiver<ReceiverCommand>,
    ) {
        while !*stop.borrow() {
            self.state.connection.set(ConnectionState::Connecting);
            if let Err(err) = self.connect_once(&mut stop, &mut commands).await {
                warn!("Sendspin connection failed: {err}");
            }
            self.state.connection.set(ConnectionState::Disconnected);

            tokio::select! {
                _ = tokio::time::sleep(self.retry_delay) => {}
                _ = stop.wait_for(|stopped| *stopped) => break,
            }
        }
    }

    #[instrument(skip_all, fields(url = %self.url))]
    async fn connect_once(
        &mut self,
        stop: &mut watch::Receiver<bool>,
        commands: &mut mpsc::UnboundedReceiver<ReceiverCommand>,
    ) -> Result<(), SendspinError> {
        let (socket, _) = connect_async(self.url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();

        send(&mut sink, &self.hello()).await?;
        self.clock = ClockSync::new();
        self.state.connection.set(ConnectionState::Connected);
        info!("Sendspin connected to {}", self.url);
        self.listener.on_event(ReceiverEvent::Connected);

        let mut heartbeat = tokio::time::interval(self.heartbeat_interval);
        let mut time_sync = tokio::time::interval(TIME_SYNC_INTERVAL);
        let result = loop {
            tokio::select! {
                _ = stop.wait_for(|stopped| *stopped) => break Ok(()),
                _ = heartbeat.tick() => {
                    if let Err(err) = self.send_state(&mut sink).await {
                        break Err(err);
                    }
                }
                _ = time_sync.tick() => {
                    if let Err(err) = send(&mut sink, &client_time(now_micros())).await {
                        break Err(err);
                    }
                }
                command = commands.recv() => match command {
                    Some(ReceiverCommand::ReportState) => {
                        if let Err(err) = self.send_state(&mut sink).await {
                            break Err(err);
                        }
                    }
                    None => break Ok(()),
                },
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(err) = self.on_text(text.as_str(), &mut sink).await {
                            break Err(err);
                        }
                    }
                    Some(Ok(Message::Binary(data))) => self.on_binary(&data),
                    Some(Ok(Message::Close(_))) | None => {
                        break Err(SendspinError::Connection("connection closed".to_string()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break Err(err.into()),
                },
            }
        };

        let _ = sink.close().await;
        self.dispatcher.reset(&self.state);
        self.state.connection.set(ConnectionState::Disconnected);
        self.listener.on_event(ReceiverEvent::Disconnected);
        result
    }

    fn hello(&self) -> WireMessage {
        let formats = self
            .formats
            .as_ref()
            .map(|source| source())
            .unwrap_or_default();
        client_hello(&self.identity, &formats)
    }

    async fn send_state(&self, sink: &mut WsSink) -> Result<(), SendspinError> {
        let report = client_state(self.state.volume_percent(), self.state.muted.get());
        send(sink, &report).await
    }

    async fn on_text(&mut self, text: &str, sink: &mut WsSink) -> Result<(), SendspinError> {
        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(err) => {
                debug!("Dropping Sendspin message: {err}");
                return Ok(());
            }
        };

        if let ServerMessage::Time(sample) = message {
            self.on_time(sample);
            return Ok(());
        }

        let dispatch = self.dispatcher.dispatch(message, &self.state);
        if let Some(event) = dispatch.event {
            self.listener.on_event(event);
        }
        if dispatch.acknowledge {
            self.send_state(sink).await?;
        }
        Ok(())
    }

    fn on_time(&mut self, sample: TimeSample) {
        self.clock.update(
            sample.client_transmitted,
            sample.server_received,
            sample.server_transmitted,
            now_micros(),
        );
        if let Some(rtt) = self.clock.rtt_micros() {
            debug!("Sendspin clock sync: rtt {rtt} us");
        }
    }

    fn on_binary(&mut self, frame: &[u8]) {
        match AudioChunk::parse(frame) {
            Ok(chunk) => {
                if let Some(event) = self.dispatcher.audio(chunk, &self.state) {
                    self.listener.on_event(event);
                }
            }
            Err(err) => debug!("Dropping Sendspin frame: {err}"),
        }
    }
}

async fn send(sink: &mut WsSink, message: &WireMessage) -> Result<(), SendspinError> {
    sink.send(Message::text(encode(message)?)).await?;
    Ok(())
}
