use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use sysinfo::System;
use tqdm::tqdm;
use tqdm::Tqdm;

/// Progress bar driven from a background thread.
///
/// Updates are sent over a channel so `inc` can be called from any thread
/// (including rayon workers) without contending on the terminal.
pub struct Progress {
    total: usize,
    progress: Arc<Mutex<Tqdm<Range<usize>>>>,
    count: AtomicUsize,
    sender: mpsc::Sender<usize>,
    progress_thread: Option<thread::JoinHandle<()>>,
}

impl Progress {
    pub fn new(total: usize, description: &str) -> Self {
        let progress = Arc::new(Mutex::new(tqdm(0..total).desc(Some(description))));
        let (tx, rx) = mpsc::channel();
        let progress_clone = Arc::clone(&progress);

        let handle = thread::spawn(move || {
            for step in rx {
                if let Ok(mut bar) = progress_clone.lock() {
                    let _ = bar.pbar.update(step);
                }
            }
        });

        Self {
            total,
            progress,
            count: AtomicUsize::new(0),
            sender: tx,
            progress_thread: Some(handle),
        }
    }

    /// Advances the bar by one step. Extra steps beyond `total` are ignored.
    pub fn inc(&self) {
        let new_count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        if new_count > self.total {
            log::trace!(
                "Progress received step {} of {}; ignoring extra update",
                new_count,
                self.total
            );
            return;
        }
        let _ = self.sender.send(1);
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire).min(self.total)
    }

    /// Flushes pending updates and joins the update thread.
    pub fn finish(self) {
        drop(self.sender);
        if let Some(handle) = self.progress_thread {
            let _ = handle.join();
        }
    }
}

/// Memory currently in use on the host, in bytes.
pub fn get_rss_memory() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.used_memory()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_progress_counts_parallel_updates() {
        let total = 24;
        let pbar = Progress::new(total, "Testing progress");
        let summed: i32 = (0..total)
            .into_par_iter()
            .map(|_| {
                pbar.inc();
                1
            })
            .sum();
        pbar.inc();
        assert_eq!(pbar.count(), total);
        pbar.finish();
        assert_eq!(summed, total as i32);
    }

    #[test]
    fn test_get_rss_memory() {
        let mem_usage = get_rss_memory();
        assert!(mem_usage > 0);
    }
}
