use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use crate::broadcast::JobProgressBroadcaster;
use crate::error::ExtractError;
use crate::extractor::ProgressReporter;
use crate::jobs::{JobRecord, MAX_LIVE_PROGRESS};
use crate::repo::{RecordRepository, RepositoryError};

/// Progress reporter that writes every tick through the repository.
///
/// Ticks are clamped below 100 and dropped unless they raise the stored
/// value. Ticks for jobs that are terminal or gone are discarded.
pub struct RepositoryProgress<'a> {
    repo: &'a dyn RecordRepository,
    broadcaster: &'a JobProgressBroadcaster,
    job_id: &'a str,
    cancel: &'a AtomicBool,
    deadline: Option<(Instant, Duration)>,
    last: AtomicU8,
}

impl<'a> RepositoryProgress<'a> {
    pub fn new(
        repo: &'a dyn RecordRepository,
        broadcaster: &'a JobProgressBroadcaster,
        record: &'a JobRecord,
        cancel: &'a AtomicBool,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            repo,
            broadcaster,
            job_id: &record.id,
            cancel,
            deadline: timeout.map(|t| (Instant::now() + t, t)),
            last: AtomicU8::new(record.progress),
        }
    }

    /// Last progress value written by this reporter.
    pub fn last(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

impl ProgressReporter for RepositoryProgress<'_> {
    fn report(&self, percent: u8) {
        let percent = percent.min(MAX_LIVE_PROGRESS);
        if percent <= self.last.load(Ordering::SeqCst) {
            return;
        }

        match self
            .repo
            .update(self.job_id, &mut |r: &mut JobRecord| r.advance(percent))
        {
            Ok(record) => {
                self.last.fetch_max(record.progress, Ordering::SeqCst);
                self.broadcaster.publish(&record, "Extracting content");
            }
            Err(RepositoryError::Rejected(e)) => {
                log::debug!(
                    "Discarding progress {} for job {}: {}",
                    percent,
                    self.job_id,
                    e
                );
            }
            Err(RepositoryError::NotFound(_)) => {
                log::debug!(
                    "Discarding progress {} for deleted job {}",
                    percent,
                    self.job_id
                );
            }
            Err(e) => {
                log::warn!(
                    "Failed to record progress {} for job {}: {}",
                    percent,
                    self.job_id,
                    e
                );
            }
        }
    }

    fn checkpoint(&self) -> Result<(), ExtractError> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(ExtractError::Cancelled);
        }
        if let Some((deadline, limit)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ExtractError::TimedOut {
                    after_secs: limit.as_secs(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::jobs::{JobStatus, ParsedContent};
    use crate::repo::MemoryRepository;

    fn processing(repo: &MemoryRepository, id: &str) -> JobRecord {
        repo.create(&JobRecord::new(id, "a.csv", Path::new("/tmp/a.csv")))
            .unwrap();
        repo.update(id, &mut |r: &mut JobRecord| r.begin_processing())
            .unwrap()
    }

    #[test]
    fn test_ticks_are_clamped_and_monotonic() {
        let repo = MemoryRepository::new();
        let broadcaster = JobProgressBroadcaster::default();
        let record = processing(&repo, "p");
        let cancel = AtomicBool::new(false);
        let progress = RepositoryProgress::new(&repo, &broadcaster, &record, &cancel, None);

        progress.report(40);
        progress.report(20);
        assert_eq!(repo.fetch("p").unwrap().unwrap().progress, 40);

        progress.report(100);
        let stored = repo.fetch("p").unwrap().unwrap();
        assert_eq!(stored.progress, 99);
        assert_eq!(stored.status, JobStatus::Processing);
        assert_eq!(progress.last(), 99);
    }

    #[test]
    fn test_late_tick_after_terminal_is_discarded() {
        let repo = MemoryRepository::new();
        let broadcaster = JobProgressBroadcaster::default();
        let record = processing(&repo, "done");
        repo.update("done", &mut |r: &mut JobRecord| {
            r.complete(ParsedContent::unsupported())
        })
        .unwrap();
        let before = repo.fetch("done").unwrap().unwrap();

        let cancel = AtomicBool::new(false);
        let progress = RepositoryProgress::new(&repo, &broadcaster, &record, &cancel, None);
        progress.report(60);

        assert_eq!(repo.fetch("done").unwrap().unwrap(), before);
    }

    #[test]
    fn test_tick_for_deleted_job_is_discarded() {
        let repo = MemoryRepository::new();
        let broadcaster = JobProgressBroadcaster::default();
        let record = processing(&repo, "gone");
        repo.delete("gone").unwrap();

        let cancel = AtomicBool::new(false);
        let progress = RepositoryProgress::new(&repo, &broadcaster, &record, &cancel, None);
        progress.report(30);
        assert!(repo.fetch("gone").unwrap().is_none());
    }

    #[test]
    fn test_accepted_ticks_are_broadcast() {
        let repo = MemoryRepository::new();
        let broadcaster = JobProgressBroadcaster::default();
        let mut rx = broadcaster.subscribe();
        let record = processing(&repo, "b");
        let cancel = AtomicBool::new(false);
        let progress = RepositoryProgress::new(&repo, &broadcaster, &record, &cancel, None);

        progress.report(10);
        progress.report(10);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.progress, 10);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_checkpoint_observes_cancel_flag() {
        let repo = MemoryRepository::new();
        let broadcaster = JobProgressBroadcaster::default();
        let record = processing(&repo, "c");
        let cancel = AtomicBool::new(false);
        let progress = RepositoryProgress::new(&repo, &broadcaster, &record, &cancel, None);

        assert!(progress.checkpoint().is_ok());
        cancel.store(true, Ordering::SeqCst);
        assert!(matches!(progress.checkpoint(), Err(ExtractError::Cancelled)));
    }

    #[test]
    fn test_checkpoint_observes_deadline() {
        let repo = MemoryRepository::new();
        let broadcaster = JobProgressBroadcaster::default();
        let record = processing(&repo, "t");
        let cancel = AtomicBool::new(false);
        let progress =
            RepositoryProgress::new(&repo, &broadcaster, &record, &cancel, Some(Duration::ZERO));

        assert!(matches!(
            progress.checkpoint(),
            Err(ExtractError::TimedOut { after_secs: 0 })
        ));
    }
}
