use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{info, Logger};
use tokio::sync::mpsc;

use crate::routes::admin::TerminationFunctionWrapper;

/// Coordinates a graceful stop of both servers. Stopping is requested
/// either through `/terminate` or by Ctrl-C.
#[derive(Clone)]
pub struct Shutdown {
    sender: mpsc::Sender<()>,
    requested: Shared<BoxFuture<'static, ()>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<()>(1);

        let requested = async move {
            receiver.recv().await;
        }
        .boxed()
        .shared();

        Shutdown { sender, requested }
    }

    /// The callback behind the termination route.
    pub fn trigger(&self) -> TerminationFunctionWrapper {
        let sender = self.sender.clone();

        Arc::new(move || {
            let sender = sender.clone();

            async move {
                // full means a stop is already pending
                let _ = sender.try_send(());
            }
            .boxed()
        })
    }

    /// Resolves once a stop has been requested.
    pub fn requested(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        self.requested.clone()
    }

    /// Requests a stop on Ctrl-C. Returns early if a stop is requested
    /// some other way first.
    pub async fn watch_signals(self, logger: Arc<Logger>) {
        tokio::select! {
            _ = self.requested.clone() => {},
            _ = tokio::signal::ctrl_c() => {
                info!(logger, "Received interrupt, shutting down...");
                let _ = self.sender.try_send(());
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Shutdown::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;

    use super::Shutdown;

    #[tokio::test(start_paused = true)]
    async fn servers_wait_until_a_stop_is_requested() {
        let shutdown = Shutdown::new();

        assert!(timeout(Duration::from_secs(60), shutdown.requested())
            .await
            .is_err());

        let terminate = shutdown.trigger();
        terminate().await;

        timeout(Duration::from_secs(1), shutdown.requested())
            .await
            .expect("stop requested");
        timeout(Duration::from_secs(1), shutdown.clone().requested())
            .await
            .expect("every waiter sees the stop");
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_termination_does_not_block() {
        let shutdown = Shutdown::new();
        let terminate = shutdown.trigger();

        for _ in 0..3 {
            timeout(Duration::from_secs(1), terminate())
                .await
                .expect("terminate returns");
        }

        timeout(Duration::from_secs(1), shutdown.requested())
            .await
            .expect("stop requested");
    }

    #[tokio::test(start_paused = true)]
    async fn signal_watcher_returns_after_a_requested_stop() {
        let shutdown = Shutdown::new();
        let watcher = tokio::spawn(shutdown.clone().watch_signals(Arc::new(log::discard())));

        let terminate = shutdown.trigger();
        terminate().await;

        timeout(Duration::from_secs(1), watcher)
            .await
            .expect("watcher returns")
            .expect("join watcher");
    }
}
