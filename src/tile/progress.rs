//! Progress reporting and cancellation for tiling runs.
//!
//! The engine reports through a [`ProgressObserver`] and never touches a UI
//! itself. A headless caller uses [`NoopObserver`] or logs; an interactive
//! front-end consumes [`ProgressEvent`]s from a [`ChannelObserver`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use super::grid::TileRequest;

/// Terminal status of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed {
        tiles: u64,
    },
    Failed {
        reason: String,
        coordinate: Option<(u32, u32)>,
    },
    Cancelled,
}

/// Receives progress of a tiling run.
///
/// `on_tile` is called after each tile file has been written, with the
/// number of tiles completed so far.
pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _total: u64) {}

    fn on_tile(&self, completed: u64, total: u64, request: &TileRequest, path: &Path);

    fn on_finish(&self, _status: &RunStatus) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_tile(&self, _completed: u64, _total: u64, _request: &TileRequest, _path: &Path) {}
}

/// Event forwarded by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        total: u64,
    },
    Tile {
        completed: u64,
        total: u64,
        request: TileRequest,
        path: PathBuf,
    },
    Finished(RunStatus),
}

/// Observer forwarding events over an unbounded channel.
///
/// Sending never blocks the engine; events are dropped silently once the
/// receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_start(&self, total: u64) {
        let _ = self.sender.send(ProgressEvent::Started { total });
    }

    fn on_tile(&self, completed: u64, total: u64, request: &TileRequest, path: &Path) {
        let _ = self.sender.send(ProgressEvent::Tile {
            completed,
            total,
            request: *request,
            path: path.to_path_buf(),
        });
    }

    fn on_finish(&self, status: &RunStatus) {
        let _ = self.sender.send(ProgressEvent::Finished(status.clone()));
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Shared flag polled by the engine before each tile.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
