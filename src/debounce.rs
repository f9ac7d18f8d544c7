use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A single-slot register for a delayed task. Scheduling a task cancels
/// whichever task is still waiting out its delay. Once the delay has
/// passed the task is spawned on its own, so cancellation only ever
/// affects the timer, never work that has already started.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Runs `task` after the delay unless another task is scheduled or
    /// [`Debouncer::cancel`] is called first.
    pub fn schedule<F>(&self, task: F)
    where F: Future<Output = ()> + Send + 'static {
        let delay = self.delay;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(task);
        });

        if let Some(previous) = self.pending.lock().unwrap().replace(timer) {
            previous.abort();
        }
    }

    /// Clears the pending timer, if any. Returns whether one was still
    /// waiting.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().unwrap().take() {
            Some(timer) => {
                let waiting = !timer.is_finished();
                timer.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap()
            .as_ref()
            .map_or(false, |timer| !timer.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(timer) = pending.take() {
                timer.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::sleep;

    use super::Debouncer;

    const DELAY: Duration = Duration::from_millis(400);

    #[tokio::test(start_paused = true)]
    async fn only_the_last_scheduled_task_runs() {
        let debouncer = Debouncer::new(DELAY);
        let (sender, mut receiver) = mpsc::unbounded_channel();

        for i in 0..3 {
            let sender = sender.clone();
            debouncer.schedule(async move {
                sender.send(i).unwrap();
            });

            sleep(Duration::from_millis(100)).await;
            assert!(debouncer.is_pending());
        }

        drop(sender);
        sleep(Duration::from_secs(1)).await;

        assert!(!debouncer.is_pending());
        assert_eq!(receiver.recv().await, Some(2));
        assert_eq!(receiver.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timers_never_fire() {
        let debouncer = Debouncer::new(DELAY);
        let (sender, mut receiver) = mpsc::unbounded_channel::<()>();

        debouncer.schedule(async move {
            sender.send(()).unwrap();
        });

        sleep(Duration::from_millis(100)).await;
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        sleep(Duration::from_secs(1)).await;

        assert_eq!(receiver.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_after_the_delay_leaves_started_work_alone() {
        let debouncer = Debouncer::new(DELAY);
        let (sender, mut receiver) = mpsc::unbounded_channel();

        debouncer.schedule(async move {
            sleep(Duration::from_millis(200)).await;
            sender.send("done").unwrap();
        });

        sleep(Duration::from_millis(450)).await;
        assert!(!debouncer.cancel());

        assert_eq!(receiver.recv().await, Some("done"));
    }
}
