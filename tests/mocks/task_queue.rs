use anyhow::Result;
use quiknews::cloud::tasks::TaskQueue;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MockTaskQueue {
    pub enqueued: Arc<Mutex<u32>>,
}

impl TaskQueue for MockTaskQueue {
    fn enqueue_digest(&self) -> Result<String> {
        let mut n = self.enqueued.lock().unwrap();
        *n += 1;
        Ok(format!("projects/p/locations/l/queues/q/tasks/{n}"))
    }
}
