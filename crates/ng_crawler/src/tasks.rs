use ng_core::{ArticleRecord, ArticleStore, Error, InsertOutcome, Result};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Resolves once `deadline` passes, or never when there is none.
pub(crate) async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Tallies of finished persistence tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub undecodable_existing: usize,
    pub failures: usize,
}

/// One spawned write per completed article, joined by [`PersistenceTasks::join_all`].
///
/// The pending count goes up on spawn and down when a task finishes,
/// whether it succeeded, failed or panicked.
pub struct PersistenceTasks {
    store: Arc<dyn ArticleStore>,
    tasks: JoinSet<(String, Result<InsertOutcome>)>,
    summary: WriteSummary,
}

impl PersistenceTasks {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            tasks: JoinSet::new(),
            summary: WriteSummary::default(),
        }
    }

    pub fn spawn(&mut self, record: ArticleRecord) {
        let store = self.store.clone();
        self.tasks.spawn(async move {
            let outcome = store.insert_if_absent(&record).await;
            (record.title, outcome)
        });
        debug!(pending = self.tasks.len(), "Queued article for persistence");
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every pending write.
    ///
    /// Returns early with `Error::Cancelled` when `token` fires, or with
    /// `Error::Timeout` once `deadline` passes; either way the writes still
    /// running are aborted.
    pub async fn join_all(
        &mut self,
        token: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<WriteSummary> {
        let deadline_passed = expiry(deadline);
        tokio::pin!(deadline_passed);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    warn!(pending = self.tasks.len(), "Run cancelled, aborting pending writes");
                    self.tasks.abort_all();
                    return Err(Error::Cancelled);
                }
                _ = &mut deadline_passed => {
                    warn!(pending = self.tasks.len(), "Run deadline reached, aborting pending writes");
                    self.tasks.abort_all();
                    return Err(Error::Timeout(format!(
                        "{} writes still pending",
                        self.tasks.len()
                    )));
                }
                joined = self.tasks.join_next() => match joined {
                    None => break,
                    Some(joined) => self.record(joined),
                },
            }
        }

        info!(
            inserted = self.summary.inserted,
            duplicates = self.summary.duplicates,
            failures = self.summary.failures,
            "All persistence tasks finished"
        );
        Ok(self.summary)
    }

    fn record(
        &mut self,
        joined: std::result::Result<(String, Result<InsertOutcome>), tokio::task::JoinError>,
    ) {
        match joined {
            Ok((_, Ok(InsertOutcome::Inserted))) => self.summary.inserted += 1,
            Ok((title, Ok(InsertOutcome::Duplicate))) => {
                info!(%title, "Article with the same title already exists, skipped insertion");
                self.summary.duplicates += 1;
            }
            Ok((title, Ok(InsertOutcome::ExistingUndecodable))) => {
                warn!(%title, "Stored article with this title is unreadable, skipped insertion");
                self.summary.undecodable_existing += 1;
            }
            Ok((title, Err(e))) => {
                error!(%title, error = %e, "Failed to persist article");
                self.summary.failures += 1;
            }
            Err(e) => {
                error!(error = %Error::Task(e.to_string()), "Persistence task did not complete");
                self.summary.failures += 1;
            }
        }
    }
}
