use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use crate::data::loader::Batches;
use crate::error::{Result, SrError};

/// Runs `jobs` on a worker thread, keeping at most `depth` finished batches
/// queued ahead of the consumer. With `depth == 0` the jobs run inline.
///
/// Dropping the returned iterator stops the worker at its next send.
pub fn prefetch<B, I>(depth: usize, jobs: I) -> Batches<'static, B>
where
    B: Send + 'static,
    I: Iterator<Item = Result<B>> + Send + 'static,
{
    if depth == 0 {
        return Box::new(jobs);
    }

    let (tx, rx) = mpsc::sync_channel(depth);
    let handle = thread::spawn(move || {
        for job in jobs {
            // Receiver dropped: nobody wants the rest of the epoch.
            if tx.send(job).is_err() {
                break;
            }
        }
    });
    Box::new(Prefetched { rx, handle: Some(handle) })
}

struct Prefetched<B> {
    rx: Receiver<Result<B>>,
    handle: Option<JoinHandle<()>>,
}

impl<B> Iterator for Prefetched<B> {
    type Item = Result<B>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rx.recv() {
            Ok(item) => Some(item),
            Err(_) => {
                let handle = self.handle.take()?;
                match handle.join() {
                    Ok(()) => None,
                    Err(_) => Some(Err(SrError::dataset("prefetch worker panicked"))),
                }
            }
        }
    }
}
