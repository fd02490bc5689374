//! Display-frame scheduling.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::session::SessionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Posts `SessionEvent::Frame` into the session queue after a fixed delay.
pub struct TimerScheduler {
    tx: mpsc::Sender<SessionEvent>,
    interval: Duration,
    next: u64,
    tasks: HashMap<u64, JoinHandle<()>>,
}

impl TimerScheduler {
    pub fn new(tx: mpsc::Sender<SessionEvent>, interval: Duration) -> Self {
        Self {
            tx,
            interval,
            next: 0,
            tasks: HashMap::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|t| !t.is_finished()).count()
    }
}

impl FrameScheduler for TimerScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.tasks.retain(|_, task| !task.is_finished());

        self.next += 1;
        let handle = FrameHandle(self.next);
        let tx = self.tx.clone();
        let interval = self.interval;
        let task = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = tx.send(SessionEvent::Frame(handle)).await;
        });
        self.tasks.insert(handle.0, task);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if let Some(task) = self.tasks.remove(&handle.0) {
            task.abort();
        }
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
