//! Fixed-size worker pool over one shared inbound queue.
//!
//! # Shutdown
//! Workers watch a stop token that is a child of the caller's shutdown token.
//! A supervisor task waits for whichever comes first:
//! - the caller cancelling the shutdown token
//! - a worker reporting an error (strict mode only)
//! - every worker exiting because the queue closed
//!
//! It then cancels the stop token, joins every worker and resolves `PoolDone`
//! with the error that triggered the stop, if any. Workers only notice the stop
//! token between events, never in the middle of one.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::FailureMode;
use crate::dispatcher::{process_event, InboundEvent};
use crate::errors::BotError;
use crate::state::BotState;

type SharedQueue = Arc<Mutex<mpsc::Receiver<InboundEvent>>>;

/// Resolves once every worker has exited.
///
/// Yields `Err` with the first worker error when a strict-mode failure stopped the pool.
pub struct PoolDone(oneshot::Receiver<Option<BotError>>);

impl Future for PoolDone {
    type Output = Result<(), BotError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx).map(|received| match received {
            Ok(None) => Ok(()),
            Ok(Some(e)) => Err(e),
            Err(_) => Err(BotError::Internal(anyhow::anyhow!(
                "worker pool supervisor exited without reporting"
            ))),
        })
    }
}

/// Spawns `workers` workers pulling from `events`.
///
/// Each worker gets its own fast generator seeded from `seed`, so no generator is
/// shared between tasks.
pub fn start_pool<S: RngCore>(
    state: BotState,
    events: mpsc::Receiver<InboundEvent>,
    workers: usize,
    failure_mode: FailureMode,
    shutdown: &CancellationToken,
    seed: &mut S,
) -> PoolDone {
    let stop = shutdown.child_token();
    let queue: SharedQueue = Arc::new(Mutex::new(events));
    let (error_tx, mut error_rx) = mpsc::channel::<BotError>(workers.max(1));

    let mut tasks = JoinSet::new();
    for id in 0..workers {
        let worker = Worker {
            id,
            state: state.clone(),
            queue: Arc::clone(&queue),
            errors: error_tx.clone(),
            stop: stop.clone(),
            failure_mode,
            rng: SmallRng::seed_from_u64(seed.next_u64()),
        };
        tasks.spawn(worker.run());
    }
    // Only workers hold senders now; the channel closes once they all exit.
    drop(error_tx);
    drop(queue);

    info!(workers, mode = ?failure_mode, "Worker pool started");

    let (done_tx, done_rx) = oneshot::channel();
    tokio::spawn(async move {
        let cause = tokio::select! {
            _ = stop.cancelled() => None,
            first_error = error_rx.recv() => first_error,
        };

        if let Some(e) = &cause {
            error!(error = %e, "Worker failed, stopping pool");
        }
        stop.cancel();

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task panicked");
            }
        }

        info!("Worker pool stopped");
        let _ = done_tx.send(cause);
    });

    PoolDone(done_rx)
}

struct Worker {
    id: usize,
    state: BotState,
    queue: SharedQueue,
    errors: mpsc::Sender<BotError>,
    stop: CancellationToken,
    failure_mode: FailureMode,
    rng: SmallRng,
}

impl Worker {
    async fn run(mut self) {
        debug!(worker = self.id, "Worker started");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                event = next_event(&self.queue) => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let chat_id = event.chat_id;
            let message_id = event.message_id;

            match process_event(&self.state, event, &mut self.rng).await {
                Ok(outcome) => {
                    debug!(worker = self.id, chat_id, message_id, ?outcome, "Event handled");
                }
                Err(e) => match self.failure_mode {
                    FailureMode::Isolate => {
                        error!(
                            worker = self.id,
                            chat_id,
                            message_id,
                            error = %e,
                            "Failed to caption photo, dropping event"
                        );
                    }
                    FailureMode::Strict => {
                        let _ = self.errors.send(e).await;
                        break;
                    }
                },
            }
        }

        debug!(worker = self.id, "Worker stopped");
    }
}

async fn next_event(queue: &Mutex<mpsc::Receiver<InboundEvent>>) -> Option<InboundEvent> {
    queue.lock().await.recv().await
}
