//! Interactive board sessions.
//!
//! A [`BoardSession`] owns the current snapshot of one board and applies commands
//! to it in memory. Saves are debounced: a background writer persists the latest
//! snapshot once no mutation has arrived for the configured window. Pending work
//! is flushed on [`BoardSession::close`] and when the session is dropped. Dropping
//! blocks until that final save has finished, so a runtime shut down right after
//! the drop does not lose it.

use crate::config::SessionConfig;
use crate::domain::{Board, BoardId, BoardStore, Command, Effect};
use crate::error::{BoardError, Result};
use crate::storage::{with_timeout, Storage};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, RuntimeFlavor};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{block_in_place, JoinHandle};
use tracing::{debug, error, info, warn};

enum SaveSignal {
    Dirty,
    Flush(oneshot::Sender<Result<()>>),
}

struct Engine {
    store: BoardStore,
    current: Arc<Board>,
    /// Bumped on every mutation
    version: u64,
}

struct SessionState {
    board_id: BoardId,
    engine: Mutex<Engine>,
    storage: Arc<dyn Storage>,
    timeout: Duration,
    save_failed: AtomicBool,
    last_error: Mutex<Option<String>>,
    /// Version of the newest snapshot known to be stored
    saved_version: AtomicU64,
}

impl SessionState {
    fn snapshot(&self) -> Arc<Board> {
        self.versioned_snapshot().0
    }

    fn versioned_snapshot(&self) -> (Arc<Board>, u64) {
        let engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        (Arc::clone(&engine.current), engine.version)
    }

    fn has_unsaved_changes(&self) -> bool {
        let (_, version) = self.versioned_snapshot();
        version > self.saved_version.load(Ordering::SeqCst)
    }

    async fn persist(&self) -> Result<()> {
        let (snapshot, version) = self.versioned_snapshot();
        let result = with_timeout("save", self.timeout, self.storage.save_board(&snapshot)).await;

        let mut last_error = self.last_error.lock().unwrap_or_else(PoisonError::into_inner);
        match &result {
            Ok(()) => {
                self.saved_version.fetch_max(version, Ordering::SeqCst);
                self.save_failed.store(false, Ordering::SeqCst);
                *last_error = None;
                debug!(board = %self.board_id, "session saved");
            }
            Err(err) => {
                self.save_failed.store(true, Ordering::SeqCst);
                *last_error = Some(err.to_string());
                error!(board = %self.board_id, error = %err, "session save failed");
            }
        }
        result
    }
}

async fn run_writer(
    state: Arc<SessionState>,
    mut signals: mpsc::UnboundedReceiver<SaveSignal>,
    debounce: Duration,
) {
    let mut pending = false;

    loop {
        let signal = if pending {
            match tokio::time::timeout(debounce, signals.recv()).await {
                Ok(signal) => signal,
                Err(_) => {
                    // Failures are recorded on the state; the next mutation or flush retries
                    let _ = state.persist().await;
                    pending = false;
                    continue;
                }
            }
        } else {
            signals.recv().await
        };

        match signal {
            Some(SaveSignal::Dirty) => pending = true,
            Some(SaveSignal::Flush(reply)) => {
                let result = if pending || state.save_failed.load(Ordering::SeqCst) {
                    state.persist().await
                } else {
                    Ok(())
                };
                pending = false;
                let _ = reply.send(result);
            }
            None => {
                if pending || state.has_unsaved_changes() {
                    let _ = state.persist().await;
                }
                break;
            }
        }
    }

    debug!(board = %state.board_id, "session writer stopped");
}

/// In-memory editing session for one board with debounced persistence
pub struct BoardSession {
    state: Arc<SessionState>,
    signals: Option<mpsc::UnboundedSender<SaveSignal>>,
    writer: Option<JoinHandle<()>>,
}

impl BoardSession {
    /// Loads the board and starts the background writer
    pub async fn open(
        board_id: BoardId,
        storage: Arc<dyn Storage>,
        config: SessionConfig,
    ) -> Result<Self> {
        let timeout = config.persistence_timeout();
        let loaded = with_timeout("load", timeout, storage.load_board(&board_id)).await?;

        let mut store = BoardStore::new();
        let backfill = store.apply(&loaded, Command::AssignMissingHashes)?;
        let needs_save = !backfill.is_unchanged();

        let state = Arc::new(SessionState {
            board_id: board_id.clone(),
            engine: Mutex::new(Engine {
                store,
                current: Arc::new(backfill.board),
                version: u64::from(needs_save),
            }),
            storage,
            timeout,
            save_failed: AtomicBool::new(false),
            last_error: Mutex::new(None),
            saved_version: AtomicU64::new(0),
        });

        let (sender, receiver) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(
            Arc::clone(&state),
            receiver,
            config.save_debounce(),
        ));

        let session = Self {
            state,
            signals: Some(sender),
            writer: Some(writer),
        };
        if needs_save {
            session.mark_dirty();
        }

        info!(board = %board_id, "session opened");
        Ok(session)
    }

    pub fn board_id(&self) -> &BoardId {
        &self.state.board_id
    }

    /// The current snapshot
    pub fn board(&self) -> Arc<Board> {
        self.state.snapshot()
    }

    /// Applies a command to the current snapshot and schedules a save.
    ///
    /// A rejected command leaves the snapshot untouched and schedules nothing.
    pub fn apply(&self, command: Command) -> Result<Effect> {
        let effect = {
            let mut engine = self.state.engine.lock().unwrap_or_else(PoisonError::into_inner);
            let current = Arc::clone(&engine.current);
            let applied = engine.store.apply(&current, command)?;
            if applied.is_unchanged() {
                return Ok(applied.effect);
            }
            engine.current = Arc::new(applied.board);
            engine.version += 1;
            applied.effect
        };

        self.mark_dirty();
        Ok(effect)
    }

    /// Saves pending changes now
    pub async fn flush(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(SaveSignal::Flush(reply))?;
        response.await.map_err(|_| writer_stopped())?
    }

    /// Flushes pending changes and stops the writer
    pub async fn close(mut self) -> Result<()> {
        let flushed = self.flush().await;

        self.signals.take();
        if let Some(writer) = self.writer.take() {
            if let Err(err) = writer.await {
                error!(board = %self.state.board_id, error = %err, "session writer panicked");
            }
        }

        info!(board = %self.state.board_id, "session closed");
        flushed
    }

    /// Whether the most recent save attempt failed
    pub fn save_failed(&self) -> bool {
        self.state.save_failed.load(Ordering::SeqCst)
    }

    pub fn last_save_error(&self) -> Option<String> {
        self.state
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn mark_dirty(&self) {
        if self.send(SaveSignal::Dirty).is_err() {
            error!(board = %self.state.board_id, "mutation not scheduled for saving");
        }
    }

    fn send(&self, signal: SaveSignal) -> Result<()> {
        self.signals
            .as_ref()
            .ok_or_else(writer_stopped)?
            .send(signal)
            .map_err(|_| writer_stopped())
    }
}

impl Drop for BoardSession {
    fn drop(&mut self) {
        // Closing the channel makes the writer save anything pending, then exit
        self.signals.take();
        let Some(writer) = self.writer.take() else {
            return;
        };

        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                if let Err(err) = block_in_place(|| handle.block_on(writer)) {
                    error!(board = %self.state.board_id, error = %err, "session writer panicked");
                }
            }
            _ => {
                // The writer cannot run while this thread is blocked, so save here instead
                writer.abort();
                if self.state.has_unsaved_changes() {
                    warn!(board = %self.state.board_id, "session dropped without close, saving");
                    persist_blocking(&self.state);
                }
            }
        }
    }
}

/// Runs one save to completion on a helper thread with its own runtime
fn persist_blocking(state: &Arc<SessionState>) {
    let state = Arc::clone(state);
    let saver = std::thread::spawn(move || -> Result<()> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        runtime.block_on(state.persist())
    });

    match saver.join() {
        Ok(Ok(())) => {}
        // `persist` has already logged save failures
        Ok(Err(err)) => debug!(error = %err, "final session save did not complete"),
        Err(_) => error!("session saver thread panicked"),
    }
}

fn writer_stopped() -> BoardError {
    BoardError::StorageError("session writer is not running".to_string())
}
