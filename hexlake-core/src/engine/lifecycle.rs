//! Engine lifecycle: `Uninitialized -> Initializing -> Ready -> Closed`.
//!
//! The first caller that needs the engine stores a shared initialization
//! future in the state slot; every concurrent caller awaits that same future
//! and sees the same outcome. A failed initialization drops the slot back to
//! `Uninitialized` so a later call starts over. `Closed` is terminal.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, instrument, warn};

use crate::engine::{EngineFactory, EngineHandle};
use crate::error::LoaderError;

type InitFuture = Shared<BoxFuture<'static, Result<Arc<EngineHandle>, LoaderError>>>;

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

enum Slot {
    Uninitialized,
    Initializing { generation: u64, init: InitFuture },
    Ready(Arc<EngineHandle>),
    Closed,
}

impl Slot {
    fn state(&self) -> LifecycleState {
        match self {
            Slot::Uninitialized => LifecycleState::Uninitialized,
            Slot::Initializing { .. } => LifecycleState::Initializing,
            Slot::Ready(_) => LifecycleState::Ready,
            Slot::Closed => LifecycleState::Closed,
        }
    }
}

/// Owns the engine handle for one loader.
pub struct Lifecycle {
    factory: EngineFactory,
    slot: Mutex<Slot>,
    next_generation: AtomicU64,
    attempts: AtomicUsize,
}

impl Lifecycle {
    pub fn new(factory: EngineFactory) -> Self {
        Self {
            factory,
            slot: Mutex::new(Slot::Uninitialized),
            next_generation: AtomicU64::new(1),
            attempts: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Slot>, LoaderError> {
        self.slot
            .lock()
            .map_err(|_| LoaderError::internal("lifecycle mutex poisoned"))
    }

    /// Current state, or `Internal` if the state mutex is poisoned.
    pub fn try_state(&self) -> Result<LifecycleState, LoaderError> {
        Ok(self.lock()?.state())
    }

    /// Current state for diagnostics. Reads through a poisoned mutex, logging
    /// the poisoning, since the slot itself is never left half-written.
    pub fn state(&self) -> LifecycleState {
        match self.slot.lock() {
            Ok(slot) => slot.state(),
            Err(poisoned) => {
                let state = poisoned.into_inner().state();
                warn!(%state, "lifecycle mutex poisoned");
                state
            }
        }
    }

    /// Number of initializations started so far.
    pub fn initialization_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Return the ready engine, initializing it first if needed.
    #[instrument(skip(self))]
    pub async fn ensure_ready(
        &self,
        operation: &'static str,
    ) -> Result<Arc<EngineHandle>, LoaderError> {
        let (generation, init) = {
            let mut slot = self.lock()?;
            match &*slot {
                Slot::Ready(handle) => return Ok(handle.clone()),
                Slot::Closed => return Err(LoaderError::Closed),
                Slot::Initializing { generation, init } => {
                    debug!(generation, "joining in-flight initialization");
                    (*generation, init.clone())
                }
                Slot::Uninitialized => {
                    let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
                    let init = self.start_initialization();
                    *slot = Slot::Initializing {
                        generation,
                        init: init.clone(),
                    };
                    debug!(generation, "started initialization");
                    (generation, init)
                }
            }
        };

        let outcome = init.await;
        self.settle(generation, outcome)
    }

    /// Return the engine only if it is already ready. Never initializes.
    pub fn ready_handle(&self, operation: &'static str) -> Result<Arc<EngineHandle>, LoaderError> {
        match &*self.lock()? {
            Slot::Ready(handle) => Ok(handle.clone()),
            Slot::Closed => Err(LoaderError::Closed),
            Slot::Uninitialized | Slot::Initializing { .. } => {
                Err(LoaderError::Uninitialized { operation })
            }
        }
    }

    fn start_initialization(&self) -> InitFuture {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let factory = self.factory.clone();
        async move {
            tokio::task::spawn_blocking(move || factory.open())
                .await
                .map_err(|err| {
                    LoaderError::internal(format!("engine initialization task failed: {err}"))
                })?
                .map(Arc::new)
        }
        .boxed()
        .shared()
    }

    /// Move the slot out of `Initializing` for `generation`. Whichever waiter
    /// gets here first records the outcome; later waiters only read it.
    fn settle(
        &self,
        generation: u64,
        outcome: Result<Arc<EngineHandle>, LoaderError>,
    ) -> Result<Arc<EngineHandle>, LoaderError> {
        let mut slot = self.lock()?;
        match &*slot {
            Slot::Initializing { generation: current, .. } if *current == generation => {
                match &outcome {
                    Ok(handle) => {
                        info!(generation, "engine ready");
                        *slot = Slot::Ready(handle.clone());
                    }
                    Err(err) => {
                        warn!(generation, error = %err, "engine initialization failed");
                        *slot = Slot::Uninitialized;
                    }
                }
                outcome
            }
            Slot::Closed => Err(LoaderError::Closed),
            _ => outcome,
        }
    }

    /// Release the engine and enter the terminal `Closed` state.
    ///
    /// Closing a never-initialized or already-closed lifecycle does no engine
    /// work. An in-flight initialization is awaited and its engine released.
    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<(), LoaderError> {
        let previous = {
            let mut slot = self.lock()?;
            std::mem::replace(&mut *slot, Slot::Closed)
        };
        let handle = match previous {
            Slot::Ready(handle) => Some(handle),
            Slot::Initializing { init, .. } => init.await.ok(),
            Slot::Uninitialized | Slot::Closed => None,
        };

        if let Some(handle) = handle {
            tokio::task::spawn_blocking(move || handle.release())
                .await
                .map_err(|err| LoaderError::internal(format!("engine release task failed: {err}")))??;
            info!("engine closed");
        } else {
            debug!("close with no engine to release");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;

    fn lifecycle(config: LoaderConfig) -> Arc<Lifecycle> {
        Arc::new(Lifecycle::new(EngineFactory::new(Arc::new(config))))
    }

    fn failing_config() -> LoaderConfig {
        LoaderConfig {
            scratch_dir: Some("/nonexistent/hexlake/scratch".into()),
            ..LoaderConfig::default()
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_initialization() -> anyhow::Result<()> {
        let lifecycle = lifecycle(LoaderConfig::default());
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let lifecycle = lifecycle.clone();
            tasks.push(tokio::spawn(async move {
                lifecycle.ensure_ready("initialize").await
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await??);
        }
        assert_eq!(lifecycle.initialization_attempts(), 1);
        assert!(handles.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(lifecycle.state(), LifecycleState::Ready);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_callers_observe_the_same_failure_then_retry() -> anyhow::Result<()> {
        let lifecycle = lifecycle(failing_config());
        let (left, right) = tokio::join!(
            lifecycle.ensure_ready("initialize"),
            lifecycle.ensure_ready("ingest")
        );
        let left = left.err();
        let right = right.err();
        assert!(matches!(left, Some(LoaderError::Initialization { .. })));
        assert_eq!(left, right);
        assert_eq!(lifecycle.initialization_attempts(), 1);
        assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);

        assert!(lifecycle.ensure_ready("initialize").await.is_err());
        assert_eq!(lifecycle.initialization_attempts(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn ready_handle_requires_prior_initialization() -> anyhow::Result<()> {
        let lifecycle = lifecycle(LoaderConfig::default());
        let err = lifecycle.ready_handle("query").err();
        assert_eq!(err, Some(LoaderError::Uninitialized { operation: "query" }));
        assert_eq!(lifecycle.initialization_attempts(), 0);

        lifecycle.ensure_ready("initialize").await?;
        assert!(lifecycle.ready_handle("query").is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn close_is_idempotent_and_terminal() -> anyhow::Result<()> {
        let lifecycle = lifecycle(LoaderConfig::default());
        let handle = lifecycle.ensure_ready("initialize").await?;

        lifecycle.close().await?;
        lifecycle.close().await?;
        assert!(handle.is_released());
        assert_eq!(lifecycle.state(), LifecycleState::Closed);

        let err = lifecycle.ensure_ready("initialize").await.err();
        assert_eq!(err, Some(LoaderError::Closed));
        assert_eq!(lifecycle.ready_handle("query").err(), Some(LoaderError::Closed));
        Ok(())
    }

    #[tokio::test]
    async fn poisoned_state_mutex_is_reported() -> anyhow::Result<()> {
        let lifecycle = lifecycle(LoaderConfig::default());
        let panicked = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _slot = lifecycle.slot.lock();
                    panic!("poison the lifecycle mutex");
                })
                .join()
                .is_err()
        });
        assert!(panicked);

        assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);
        assert!(matches!(lifecycle.try_state(), Err(LoaderError::Internal(_))));
        assert!(matches!(
            lifecycle.ensure_ready("initialize").await,
            Err(LoaderError::Internal(_))
        ));
        assert_eq!(lifecycle.initialization_attempts(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn close_without_initialization_does_no_engine_work() -> anyhow::Result<()> {
        let lifecycle = lifecycle(LoaderConfig::default());
        lifecycle.close().await?;
        assert_eq!(lifecycle.initialization_attempts(), 0);
        assert_eq!(lifecycle.state(), LifecycleState::Closed);
        Ok(())
    }
}
