// Cross-thread dispatcher
//
// Background-loop code produces UI events; the host's UI thread must run the
// handlers. The dispatcher is the sending half (any thread, never blocks),
// the event queue is the receiving half (owned and drained by the UI thread
// only). FIFO, no coalescing, handlers never run concurrently.

use crate::protocol::{CommandMessage, cmd};
use crate::ui::{FileMetadata, NO_CREDENTIAL_NOTICE, UiSurface};
use serde_json::{Value, json};
use tokio::sync::mpsc;

/// The fixed set of signals that cross from the background loop to the UI
/// thread.
#[derive(Debug, Clone, PartialEq)]
pub enum UiSignal {
    /// Reset the host UI to a clean state.
    ResetUi,

    /// Open a native file picker; the correlation id ties the eventual
    /// selection (or cancellation) back to the request that asked for it.
    OpenFileBrowser { command_id: i64 },

    /// Show the one-time "no API key" notice.
    NoCredentialNotice,

    /// Relay an arbitrary payload to the embedded UI surface verbatim.
    ForwardToSurface { payload: Value },
}

/// Create a connected dispatcher/queue pair.
///
/// The dispatcher side is cheap to clone and hand to background tasks; the
/// queue side belongs to the UI thread for the session's lifetime.
pub fn ui_channel() -> (UiDispatcher, UiEventQueue) {
    // Unbounded: emission must never block the background thread, and the
    // contract forbids dropping or coalescing signals.
    let (tx, rx) = mpsc::unbounded_channel();
    (UiDispatcher { tx }, UiEventQueue { rx })
}

/// Sending half: emit signals from any thread.
#[derive(Clone)]
pub struct UiDispatcher {
    tx: mpsc::UnboundedSender<UiSignal>,
}

impl UiDispatcher {
    /// Enqueue a signal for the UI thread. Never blocks.
    pub fn emit(&self, signal: UiSignal) {
        if self.tx.send(signal).is_err() {
            tracing::warn!("UI signal dropped - event queue has been closed");
        }
    }

    pub fn reset_ui(&self) {
        self.emit(UiSignal::ResetUi);
    }

    pub fn open_file_browser(&self, command_id: i64) {
        self.emit(UiSignal::OpenFileBrowser { command_id });
    }

    pub fn no_credential_notice(&self) {
        self.emit(UiSignal::NoCredentialNotice);
    }

    pub fn forward(&self, payload: Value) {
        self.emit(UiSignal::ForwardToSurface { payload });
    }

    /// Forward a tagged command message to the UI surface.
    pub fn send_cmd(&self, tag: &str, data: Option<Value>) {
        let message = CommandMessage {
            cmd: tag.to_string(),
            data,
            command_id: None,
        };
        match serde_json::to_value(&message) {
            Ok(payload) => self.forward(payload),
            Err(e) => tracing::error!("failed to serialize UI command '{}': {}", tag, e),
        }
    }
}

/// Receiving half: owned by the UI thread, which drains it in FIFO order.
pub struct UiEventQueue {
    rx: mpsc::UnboundedReceiver<UiSignal>,
}

impl UiEventQueue {
    /// Handle everything currently queued, without blocking. Returns the
    /// number of signals processed. Intended to be called from the host's
    /// own event loop tick.
    pub fn process_pending(&mut self, surface: &mut dyn UiSurface) -> usize {
        let mut handled = 0;
        while let Ok(signal) = self.rx.try_recv() {
            dispatch(signal, surface);
            handled += 1;
        }
        handled
    }

    /// Block the UI thread draining signals until every dispatcher clone has
    /// been dropped. Used by hosts whose main loop is the queue itself.
    pub fn run(&mut self, surface: &mut dyn UiSurface) {
        while let Some(signal) = self.rx.blocking_recv() {
            dispatch(signal, surface);
        }
        tracing::debug!("UI event queue closed");
    }
}

/// Execute one signal's handler. Runs on the UI thread by construction.
fn dispatch(signal: UiSignal, surface: &mut dyn UiSurface) {
    match signal {
        UiSignal::ResetUi => surface.reset_ui(),

        UiSignal::NoCredentialNotice => surface.show_notice(NO_CREDENTIAL_NOTICE),

        UiSignal::ForwardToSurface { payload } => surface.send_to_surface(payload),

        UiSignal::OpenFileBrowser { command_id } => {
            handle_file_browser(command_id, surface);
        }
    }
}

/// Run the file picker and forward the outcome to the UI surface under the
/// originating correlation id.
fn handle_file_browser(command_id: i64, surface: &mut dyn UiSurface) {
    tracing::debug!("opening file browser for commandId {}", command_id);
    let paths = surface.pick_files();

    if paths.is_empty() {
        surface.send_to_surface(json!({
            "cmd": cmd::DID_CLOSE_DOCUMENT_BROWSER_NO_SELECTIONS,
            "commandId": command_id,
        }));
        return;
    }

    let mut documents = Vec::with_capacity(paths.len());
    for path in &paths {
        match FileMetadata::from_path(path) {
            Ok(meta) => documents.push(meta),
            Err(e) => tracing::warn!("skipping unreadable selection {}: {}", path, e),
        }
    }

    surface.send_to_surface(json!({
        "cmd": cmd::DID_SELECT_DOCUMENTS,
        "data": { "documents": documents },
        "commandId": command_id,
    }));
}
