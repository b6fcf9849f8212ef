//! Background refresh loops.
//!
//! A [`RefreshLoop`] drives one [`Poller`] from a tokio task, either once or
//! periodically. Consumers obtain an [`Updates`] stream from the returned
//! [`RefreshHandle`] and wait for new documents with a bounded timeout.
//!
//! ```text
//!   Created ──start()──▶ Running ──stop()──▶ Stopping ──task exits──▶ Stopped
//!                           │                                   ▲
//!                           └──── one-shot poll finished ───────┘
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::source::{Document, Poller};

/// Default delay between two polls of a periodic loop.
pub const DEFAULT_LOOP_DELAY: Duration = Duration::from_secs(1);

/// Default time a consumer waits for new data before re-checking.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of a refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Created,
    Running,
    Stopping,
    Stopped,
}

impl LoopState {
    fn is_running(self) -> bool {
        self == LoopState::Running
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopState::Created => "created",
            LoopState::Running => "running",
            LoopState::Stopping => "stopping",
            LoopState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// How often a loop polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Poll exactly once, then stop.
    OneShot,
    /// Poll, sleep for the delay, repeat until stopped.
    Periodic(Duration),
}

impl Default for RefreshMode {
    fn default() -> Self {
        RefreshMode::Periodic(DEFAULT_LOOP_DELAY)
    }
}

/// A not yet started refresh loop.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use admon_watch::refresh::{RefreshLoop, Update};
/// use admon_watch::source::{DaemonAddress, Poller};
///
/// # tokio_test::block_on(async {
/// let poller = Arc::new(Poller::new(DaemonAddress::default().request("XML_NodeList")));
/// let handle = RefreshLoop::new(poller).start();
/// let mut updates = handle.updates();
///
/// loop {
///     match updates.next().await {
///         Update::Data(document) => println!("{:?}", document.map(None)),
///         Update::TimedOut => continue,
///         Update::Stopped => break,
///     }
/// }
/// # });
/// ```
#[derive(Debug)]
pub struct RefreshLoop {
    name: String,
    poller: Arc<Poller>,
    mode: RefreshMode,
    wait_timeout: Duration,
}

impl RefreshLoop {
    /// A periodic loop with the default delay and wait timeout.
    pub fn new(poller: Arc<Poller>) -> Self {
        Self {
            name: poller.name().to_string(),
            poller,
            mode: RefreshMode::default(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// A loop that polls once.
    pub fn one_shot(poller: Arc<Poller>) -> Self {
        Self::new(poller).mode(RefreshMode::OneShot)
    }

    /// Set the mode.
    pub fn mode(mut self, mode: RefreshMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set how long [`Updates::next`] waits before reporting a timeout.
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Name used in log output (default: the poller's name).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn state(&self) -> LoopState {
        LoopState::Created
    }

    /// Spawn the loop on the current tokio runtime.
    pub fn start(self) -> RefreshHandle {
        let RefreshLoop {
            name,
            poller,
            mode,
            wait_timeout,
        } = self;

        let (state_tx, mut state_rx) = watch::channel(LoopState::Running);
        let state = Arc::new(state_tx);
        let arrivals = poller.subscribe();

        let task = {
            let name = name.clone();
            let poller = poller.clone();
            let state = state.clone();
            tokio::spawn(async move {
                info!(refresh_loop = %name, ?mode, "refresh loop started");
                run(&name, &poller, mode, &mut state_rx).await;
                state.send_replace(LoopState::Stopped);
                info!(refresh_loop = %name, "refresh loop stopped");
            })
        };

        RefreshHandle {
            name,
            poller,
            state,
            arrivals,
            wait_timeout,
            task: Some(task),
        }
    }
}

async fn run(
    name: &str,
    poller: &Poller,
    mode: RefreshMode,
    state: &mut watch::Receiver<LoopState>,
) {
    loop {
        if !state.borrow_and_update().is_running() {
            return;
        }

        if !poller.poll().await {
            debug!(refresh_loop = %name, "poll failed, keeping previous document");
        }

        let RefreshMode::Periodic(delay) = mode else {
            return;
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stopped(state) => return,
        }
    }
}

async fn stopped(state: &mut watch::Receiver<LoopState>) {
    while state.borrow_and_update().is_running() {
        if state.changed().await.is_err() {
            return;
        }
    }
}

/// Control handle of a running loop.
///
/// Dropping the handle stops the loop.
#[derive(Debug)]
pub struct RefreshHandle {
    name: String,
    poller: Arc<Poller>,
    state: Arc<watch::Sender<LoopState>>,
    arrivals: watch::Receiver<u64>,
    wait_timeout: Duration,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The poller driven by this loop.
    pub fn poller(&self) -> &Arc<Poller> {
        &self.poller
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Ask the loop to stop and wake every waiting consumer.
    ///
    /// A request in flight is not cancelled; the loop exits once it returns.
    /// Calling this more than once has no further effect.
    pub fn stop(&self) {
        let changed = self.state.send_if_modified(|state| {
            if matches!(state, LoopState::Created | LoopState::Running) {
                *state = LoopState::Stopping;
                true
            } else {
                false
            }
        });
        if changed {
            debug!(refresh_loop = %self.name, "stop requested");
        }
    }

    /// Stop the loop and wait for its task to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(refresh_loop = %self.name, "refresh task failed: {}", e);
            }
        }
    }

    /// A consumer view of this loop.
    ///
    /// Every stream created from the same handle reports documents that
    /// arrived since the loop was started, so a consumer attached after the
    /// first poll does not miss it.
    pub fn updates(&self) -> Updates {
        Updates {
            name: self.name.clone(),
            poller: self.poller.clone(),
            arrivals: self.arrivals.clone(),
            state: self.state.subscribe(),
            timeout: self.wait_timeout,
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Outcome of waiting for the next document.
#[derive(Debug, Clone)]
pub enum Update {
    /// A new document arrived.
    Data(Arc<Document>),
    /// Nothing arrived within the wait timeout; the loop is still running.
    TimedOut,
    /// The loop is stopping or has stopped.
    Stopped,
}

/// Stream of document arrivals for one consumer.
#[derive(Debug, Clone)]
pub struct Updates {
    name: String,
    poller: Arc<Poller>,
    arrivals: watch::Receiver<u64>,
    state: watch::Receiver<LoopState>,
    timeout: Duration,
}

impl Updates {
    /// Wait for the next document, the wait timeout, or a stop.
    ///
    /// A document that arrived before the stop is still delivered before
    /// [`Update::Stopped`].
    pub async fn next(&mut self) -> Update {
        if self.take_arrival() {
            return Update::Data(self.poller.document());
        }
        if !self.state.borrow_and_update().is_running() {
            return Update::Stopped;
        }

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                changed = self.arrivals.changed() => {
                    if changed.is_err() {
                        return Update::Stopped;
                    }
                    self.arrivals.borrow_and_update();
                    return Update::Data(self.poller.document());
                }
                changed = self.state.changed() => {
                    if changed.is_err() || !self.state.borrow_and_update().is_running() {
                        if self.take_arrival() {
                            return Update::Data(self.poller.document());
                        }
                        return Update::Stopped;
                    }
                }
                _ = &mut deadline => {
                    debug!(refresh_loop = %self.name, timeout = ?self.timeout, "No update from server");
                    return Update::TimedOut;
                }
            }
        }
    }

    fn take_arrival(&mut self) -> bool {
        if self.arrivals.has_changed().unwrap_or(false) {
            self.arrivals.borrow_and_update();
            true
        } else {
            false
        }
    }

    /// The poller behind this stream, for error checks and accessors.
    pub fn poller(&self) -> &Arc<Poller> {
        &self.poller
    }
}
