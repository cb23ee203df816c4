//! Ownership of short-lived worker threads
//!
//! Turns, speech renderings and deferred cleanups each run on their own
//! thread. Every one of them is spawned through a `TaskTracker` so that
//! shutdown and tests have a join point instead of detached threads.

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, warn};

struct Task {
    name: String,
    handle: JoinHandle<()>,
}

/// Registry of spawned tasks; clones share the registry
#[derive(Clone, Default)]
pub struct TaskTracker {
    tasks: Arc<Mutex<Vec<Task>>>,
}

impl std::fmt::Debug for TaskTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskTracker")
            .field("tasks", &self.tasks.lock().len())
            .finish()
    }
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a named task and keep its handle.
    ///
    /// If the OS refuses a new thread the closure is run inline instead, so
    /// the work is never silently dropped.
    pub fn spawn<F>(&self, name: &str, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.reap();

        // Closure is shared so the fallback can still run it if spawning fails
        let job = Arc::new(Mutex::new(Some(f)));
        let thread_job = Arc::clone(&job);
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let f = thread_job.lock().take();
                if let Some(f) = f {
                    f();
                }
            });

        match spawned {
            Ok(handle) => self.tasks.lock().push(Task {
                name: name.to_string(),
                handle,
            }),
            Err(e) => {
                error!("Failed to spawn task '{}': {}, running inline", name, e);
                let inline = job.lock().take();
                if let Some(f) = inline {
                    f();
                }
            }
        }
    }

    /// Drop handles of tasks that already finished
    pub fn reap(&self) {
        let finished: Vec<Task> = {
            let mut tasks = self.tasks.lock();
            let (done, running): (Vec<Task>, Vec<Task>) =
                tasks.drain(..).partition(|t| t.handle.is_finished());
            *tasks = running;
            done
        };
        for task in finished {
            join_task(task);
        }
    }

    /// Number of tasks not yet reaped
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Block until every tracked task, including ones spawned by other
    /// tasks while waiting, has finished.
    pub fn wait_idle(&self) {
        loop {
            let batch: Vec<Task> = std::mem::take(&mut *self.tasks.lock());
            if batch.is_empty() {
                return;
            }
            for task in batch {
                join_task(task);
            }
        }
    }
}

fn join_task(task: Task) {
    if task.handle.join().is_err() {
        warn!("Task '{}' panicked", task.name);
    }
}
