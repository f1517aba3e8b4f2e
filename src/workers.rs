//! Background fetch lane
//!
//! Fetch-and-decode runs off the control thread so `Viewer::pump` never
//! blocks on IO. Bandwidth arbitration happens upstream (LoadCoordinator +
//! per-Loader single-chain guard), so one lane thread is the normal setup;
//! the lane itself just executes closures in order.

use crossbeam_channel::{Sender, unbounded};
use log::{debug, error};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct Workers {
    sender: Sender<Job>,
    // Keep handles so the lane isn't dropped while jobs are queued.
    _handles: Vec<thread::JoinHandle<()>>,
}

impl Workers {
    pub fn new(num_threads: usize) -> Self {
        let (tx, rx): (Sender<Job>, _) = unbounded();
        let mut handles = Vec::new();

        for worker_id in 0..num_threads.max(1) {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("lapsa-fetch-{}", worker_id))
                .spawn(move || {
                    debug!("fetch lane {} started", worker_id);
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                    debug!("fetch lane {} stopped", worker_id);
                })
                .expect("Failed to spawn fetch lane thread");
            handles.push(handle);
        }

        Self { sender: tx, _handles: handles }
    }

    /// Run a closure on the lane. No return value; results travel back over
    /// whatever channel the closure captured.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(e) = self.sender.send(Box::new(f)) {
            error!("Failed to enqueue fetch job: {}", e);
        }
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        // Sender drops, channel closes, lane threads exit their recv loop.
        debug!("fetch lane shutting down ({} threads)", self._handles.len());
    }
}
