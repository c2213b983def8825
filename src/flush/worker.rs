//! Background flush worker
//!
//! One thread per open log. It sleeps on `work_available`, drains the whole
//! pending write buffer under the log lock, then wakes everyone waiting on
//! `work_completed`. On exit it runs one final drain first.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::device::BlockDevice;
use crate::engine::LogShared;
use crate::error::Result;

/// Start the worker thread for `shared`
pub(crate) fn spawn<D: BlockDevice>(
    shared: Arc<LogShared<D>>,
    name: &str,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run(shared))?;
    Ok(handle)
}

/// Marks the coordinator exited however the loop ends, so waiters never
/// sleep on a worker that is gone.
struct ExitGuard<D: BlockDevice> {
    shared: Arc<LogShared<D>>,
}

impl<D: BlockDevice> Drop for ExitGuard<D> {
    fn drop(&mut self) {
        self.shared.state.lock().coordinator.mark_exited();
        self.shared.work_completed.notify_all();
    }
}

fn run<D: BlockDevice>(shared: Arc<LogShared<D>>) {
    let guard = ExitGuard {
        shared: Arc::clone(&shared),
    };
    let mut state = shared.state.lock();

    loop {
        while !state.coordinator.has_work() {
            shared.work_available.wait(&mut state);
        }

        let exiting = state.coordinator.should_exit();
        let round = state.coordinator.begin_round();
        let outcome = state.flush_pending();

        match &outcome {
            Ok(flushed) => debug!(
                round,
                flushed,
                device_limit = state.device_limit,
                "flush round complete"
            ),
            Err(e) => error!(round, error = %e, "flush round failed"),
        }

        state.coordinator.finish_round(round, outcome.as_ref().err());
        shared.work_completed.notify_all();

        if exiting {
            break;
        }
    }

    drop(state);
    drop(guard);
}
