//! Resumable import engine
//!
//! Drives the read → batch → submit → checkpoint loop for one input file.
//!
//! **Algorithm:**
//! 1. Read the stored progress `P` for the file key and skip `P` rows
//! 2. Pull listens into a batch; a full batch (`max_batch_size`) is submitted
//! 3. An accepted batch is checkpointed immediately
//! 4. A transient failure checkpoints every listen pulled so far, the failed
//!    batch included, and ends the run with [`ImportError::Interrupted`]
//! 5. Any other failure ends the run without touching the checkpoint of the batch
//!    in flight; earlier checkpoints stand
//! 6. At end of stream the trailing partial batch is submitted and the final
//!    total is written once more
//!
//! Re-running the process is the retry mechanism; the engine itself never
//! retries. The re-run resumes after the batch that failed transiently.
//!
//! The engine logs only to the [`Dispatch`] handed to it with
//! [`ImportEngine::with_dispatch`]; without one its events are discarded.

use crate::error::ImportError;
use crate::models::Listen;
use crate::services::SubmissionClient;
use crate::source::ListenSource;
use lbi_common::config::MAX_LISTENS_PER_REQUEST;
use lbi_common::ProgressStore;
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, warn, Dispatch};

/// Outcome of a completed import run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows skipped because an earlier run already processed them
    pub skipped: u64,
    /// Listens submitted by this run
    pub submitted: u64,
    /// Stored progress after the run
    pub total_processed: u64,
    /// Submission calls made by this run
    pub batches: usize,
}

/// Per-run counters
#[derive(Debug, Default)]
struct RunState {
    /// Listens pulled from the source, including prior runs
    processed: u64,
    submitted: u64,
    batches: usize,
}

pub struct ImportEngine<'a, C, P>
where
    C: SubmissionClient + ?Sized,
    P: ProgressStore,
{
    client: &'a C,
    progress: &'a mut P,
    max_batch_size: usize,
    dispatch: Dispatch,
}

impl<'a, C, P> ImportEngine<'a, C, P>
where
    C: SubmissionClient + ?Sized,
    P: ProgressStore,
{
    /// Engine with logging disabled
    ///
    /// `max_batch_size` is clamped to `1..=MAX_LISTENS_PER_REQUEST`.
    pub fn new(client: &'a C, progress: &'a mut P, max_batch_size: usize) -> Self {
        Self {
            client,
            progress,
            max_batch_size: max_batch_size.clamp(1, MAX_LISTENS_PER_REQUEST),
            dispatch: Dispatch::none(),
        }
    }

    /// Send this engine's log output to `dispatch`
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Import the listens of `source` under `file_key`, resuming from stored progress
    pub async fn import_file<S>(
        &mut self,
        file_key: &str,
        source: &mut S,
    ) -> Result<ImportSummary, ImportError>
    where
        S: ListenSource + ?Sized,
    {
        let dispatch = self.dispatch.clone();
        self.run(file_key, source).with_subscriber(dispatch).await
    }

    async fn run<S>(&mut self, file_key: &str, source: &mut S) -> Result<ImportSummary, ImportError>
    where
        S: ListenSource + ?Sized,
    {
        info!(file = file_key, "Parsing listening history...");

        let previous = self.progress.get(file_key);
        let skipped = source.skip_rows(previous)?;
        if skipped < previous {
            warn!(
                file = file_key,
                stored = previous,
                available = skipped,
                "Stored progress exceeds the rows in this file, nothing left to import"
            );
        } else if previous > 0 {
            info!(file = file_key, "Skipping {} previously processed listen(s)", previous);
        }

        let mut state = RunState {
            processed: previous,
            ..RunState::default()
        };
        let mut batch: Vec<Listen> = Vec::with_capacity(self.max_batch_size);

        while let Some(listen) = source.next_listen() {
            batch.push(listen?);
            state.processed += 1;

            if batch.len() >= self.max_batch_size {
                debug!("Splitting {} listen(s)...", batch.len());
                self.submit_batch(file_key, &batch, &mut state).await?;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.submit_batch(file_key, &batch, &mut state).await?;
        }

        self.progress.set(file_key, state.processed)?;
        info!(
            file = file_key,
            total = state.processed,
            "Process completed. Parsed and submitted {} listen(s)...",
            state.submitted
        );

        Ok(ImportSummary {
            skipped,
            submitted: state.submitted,
            total_processed: state.processed,
            batches: state.batches,
        })
    }

    /// Submit one batch and checkpoint according to the outcome
    async fn submit_batch(
        &mut self,
        file_key: &str,
        batch: &[Listen],
        state: &mut RunState,
    ) -> Result<(), ImportError> {
        match self.client.submit_many(batch).await {
            Ok(()) => {
                state.submitted += batch.len() as u64;
                state.batches += 1;
                self.progress.set(file_key, state.processed)?;
                Ok(())
            }
            Err(e) if e.is_transient() => {
                warn!(
                    file = file_key,
                    processed = state.processed,
                    error = %e,
                    "Connection error or reset submitting listens. Saving processed entries"
                );
                self.progress.set(file_key, state.processed)?;
                Err(ImportError::Interrupted {
                    checkpoint: state.processed,
                    source: e,
                })
            }
            Err(e) => Err(ImportError::Submission(e)),
        }
    }
}
