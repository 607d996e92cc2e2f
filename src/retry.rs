use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A set of cancellable delayed tasks. Every scheduled retry is tracked so
/// teardown can abort the lot instead of leaving timers to fire into a dead
/// controller.
#[derive(Debug, Default)]
pub(crate) struct RetryScheduler {
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RetryScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`. Must be called from within a tokio runtime.
    pub(crate) fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().expect("retry task list mutex poisoned");
        tasks.retain(|handle| !handle.is_finished());
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    pub(crate) fn cancel_all(&self) {
        let mut tasks = self.tasks.lock().expect("retry task list mutex poisoned");
        for handle in tasks.drain(..) {
            handle.abort();
        }
    }
}
