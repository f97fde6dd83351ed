//! Background tiling runs.
//!
//! An interactive caller hands the whole pipeline to a tokio task and keeps
//! two handles: a progress receiver and a cancellation flag.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{ProcessingFailure, TilingError};

use super::engine::{tile_slide_file_with_cache, TilingOptions, TilingSummary};
use super::progress::{CancellationFlag, ChannelObserver, ProgressEvent};

/// A tiling run executing on a tokio task.
#[derive(Debug)]
pub struct TilingTask {
    /// Progress events; closed once the run has finished
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
    pub cancel: CancellationFlag,
    pub handle: JoinHandle<Result<TilingSummary, ProcessingFailure>>,
}

impl TilingTask {
    /// Ask the run to stop before its next tile.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run, discarding remaining progress events.
    pub async fn join(self) -> Result<TilingSummary, ProcessingFailure> {
        self.handle
            .await
            .map_err(|e| ProcessingFailure::new(TilingError::Task(e.to_string())))?
    }
}

/// Spawn a run tiling `input` into `output`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_tiling(
    input: impl Into<PathBuf>,
    output: impl Into<PathBuf>,
    options: TilingOptions,
    cache_capacity: usize,
) -> TilingTask {
    let (input, output) = (input.into(), output.into());
    let (observer, events) = ChannelObserver::new();
    let cancel = CancellationFlag::new();

    let flag = cancel.clone();
    let handle = tokio::spawn(async move {
        tile_slide_file_with_cache(
            &input,
            &output,
            &options,
            &observer,
            Some(&flag),
            cache_capacity,
        )
        .await
    });

    TilingTask {
        events,
        cancel,
        handle,
    }
}
