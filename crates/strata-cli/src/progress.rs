//! Console progress for pipeline stages.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use strata_devnet::{DevnetError, Stage, StageObserver};

/// Prints one line per stage event to stderr.
#[derive(Debug)]
pub struct ConsoleObserver {
    total: usize,
    started: AtomicUsize,
}

impl ConsoleObserver {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            started: AtomicUsize::new(0),
        }
    }

    fn position(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

impl StageObserver for ConsoleObserver {
    fn stage_started(&self, stage: Stage) {
        let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        eprintln!("[{n}/{}] {stage}", self.total);
    }

    fn stage_succeeded(&self, _stage: Stage, elapsed: Duration) {
        eprintln!("      done ({})", format_elapsed(elapsed));
    }

    fn stage_failed(&self, stage: Stage, error: &DevnetError) {
        eprintln!("      {stage} failed at step {}: {error}", self.position());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::from_millis(250)), "250ms");
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn counts_started_stages() {
        let observer = ConsoleObserver::new(9);
        observer.stage_started(Stage::ValidateRequest);
        observer.stage_started(Stage::LoadAccounts);
        assert_eq!(observer.position(), 2);
    }
}
