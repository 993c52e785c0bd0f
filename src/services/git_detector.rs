//! Classification of concurrent filesystem bursts as version-control work.
//!
//! Raw notifications under the repository's metadata directory never reach
//! the change detector; they land here instead. A change to the internal
//! `HEAD` reference arms a checkout flag, any ref change refreshes a generic
//! timestamp, and `recent_operation` answers only within a short window of
//! the latest signal. The checkout flag covers the whole burst that follows
//! the HEAD move and is consumed when its window lapses, so a later,
//! unrelated ref update cannot masquerade as a checkout.

use std::path::Path;
use std::time::{Duration, Instant};

use super::time_source::SharedTimeSource;

/// How a recent burst of file changes should be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsOperation {
    /// Ordinary tooling: commit, stage, fetch
    Generic,
    /// The HEAD reference moved: branch checkout or similar
    Checkout,
}

/// Watches version-control internal state signals.
#[derive(Debug)]
pub struct GitOperationDetector {
    time: SharedTimeSource,
    window: Duration,
    last_signal: Option<Instant>,
    checkout_pending: bool,
}

impl GitOperationDetector {
    pub fn new(time: SharedTimeSource, window: Duration) -> Self {
        Self {
            time,
            window,
            last_signal: None,
            checkout_pending: false,
        }
    }

    /// Feed one raw notification for a path under the VCS metadata directory.
    pub fn observe(&mut self, path: &Path) {
        if is_head_reference(path) {
            self.checkout_pending = true;
            self.last_signal = Some(self.time.now());
        } else if is_ref_path(path) {
            self.last_signal = Some(self.time.now());
        }
        // Other metadata files (index, locks, hooks) are not signals.
    }

    /// Classify the current moment. Within the window of the latest signal
    /// every call reports the operation — a checkout burst touches many
    /// files and each one must classify alike. Outside the window the state
    /// is consumed and cleared.
    pub fn recent_operation(&mut self) -> Option<VcsOperation> {
        let last = self.last_signal?;
        if self.time.elapsed_since(last) > self.window {
            self.last_signal = None;
            self.checkout_pending = false;
            return None;
        }
        if self.checkout_pending {
            Some(VcsOperation::Checkout)
        } else {
            Some(VcsOperation::Generic)
        }
    }
}

/// True for `.git/HEAD` itself, in any repository location.
fn is_head_reference(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n == "HEAD")
        && path
            .parent()
            .and_then(|p| p.file_name())
            .is_some_and(|n| n == ".git")
}

/// True for paths under `.git/refs/`.
fn is_ref_path(path: &Path) -> bool {
    let mut components = path.components();
    while let Some(c) = components.next() {
        if c.as_os_str() == ".git" {
            return components.next().is_some_and(|c| c.as_os_str() == "refs");
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::time_source::TestTimeSource;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn detector(time: &Arc<TestTimeSource>) -> GitOperationDetector {
        GitOperationDetector::new(time.clone(), Duration::from_millis(500))
    }

    #[test]
    fn test_silent_detector_reports_nothing() {
        let time = TestTimeSource::shared();
        let mut git = detector(&time);
        assert_eq!(git.recent_operation(), None);
    }

    #[test]
    fn test_head_change_classifies_whole_burst_as_checkout() {
        let time = TestTimeSource::shared();
        let mut git = detector(&time);

        git.observe(&PathBuf::from("/repo/.git/HEAD"));
        // Every change in the burst classifies alike.
        assert_eq!(git.recent_operation(), Some(VcsOperation::Checkout));
        time.advance(Duration::from_millis(100));
        assert_eq!(git.recent_operation(), Some(VcsOperation::Checkout));
    }

    #[test]
    fn test_ref_change_classifies_generic() {
        let time = TestTimeSource::shared();
        let mut git = detector(&time);

        git.observe(&PathBuf::from("/repo/.git/refs/heads/main"));
        assert_eq!(git.recent_operation(), Some(VcsOperation::Generic));
    }

    #[test]
    fn test_window_expiry_consumes_checkout_flag() {
        let time = TestTimeSource::shared();
        let mut git = detector(&time);

        git.observe(&PathBuf::from("/repo/.git/HEAD"));
        time.advance(Duration::from_millis(501));
        assert_eq!(git.recent_operation(), None);

        // A later unrelated ref update must not look like a checkout.
        git.observe(&PathBuf::from("/repo/.git/refs/heads/main"));
        assert_eq!(git.recent_operation(), Some(VcsOperation::Generic));
    }

    #[test]
    fn test_index_churn_is_not_a_signal() {
        let time = TestTimeSource::shared();
        let mut git = detector(&time);

        git.observe(&PathBuf::from("/repo/.git/index"));
        assert_eq!(git.recent_operation(), None);
    }
}
