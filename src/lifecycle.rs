//! Connection lifecycle: run work against a connection and tear it down once
//!
//! `run_scoped` drives a body future while listening for a shutdown signal.
//! Whichever finishes first, the connection is disconnected exactly once
//! before the outcome is returned. On a signal the body is dropped mid-flight.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::error::Result;

/// A live connection that can be closed.
#[allow(async_fn_in_trait)]
pub trait Connection {
    fn is_connected(&self) -> bool;

    /// Close the connection. Calling it again is a no-op.
    async fn disconnect(&self) -> Result<()>;
}

/// Owns a connection for the duration of a run and guards its teardown.
pub struct Lifecycle<C: Connection> {
    connection: C,
    torn_down: AtomicBool,
}

impl<C: Connection> Lifecycle<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Disconnect if nobody has done it yet. Returns whether this call
    /// performed the teardown.
    pub async fn teardown(&self) -> Result<bool> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        if self.connection.is_connected() {
            self.connection.disconnect().await?;
        }
        Ok(true)
    }
}

/// How a scoped run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Completion<T> {
    Finished(T),
    Interrupted,
}

/// Run `body` until it completes or `shutdown` fires, then tear down.
///
/// A teardown failure is logged and does not replace the body's result.
pub async fn run_scoped<C, T, B, S>(lifecycle: &Lifecycle<C>, shutdown: S, body: B) -> Result<Completion<T>>
where
    C: Connection,
    B: Future<Output = Result<T>>,
    S: Future<Output = ()>,
{
    let outcome = match interruptible(shutdown, body).await {
        Completion::Finished(result) => result.map(Completion::Finished),
        Completion::Interrupted => Ok(Completion::Interrupted),
    };

    match lifecycle.teardown().await {
        Ok(true) => info!("Disconnected"),
        Ok(false) => {}
        Err(err) => warn!("Error during cleanup: {}", err),
    }

    outcome
}

/// Run `work` unless `shutdown` fires first, in which case `work` is
/// dropped where it stands. Used for setup steps that happen before a
/// `Lifecycle` exists, such as connecting and logging in.
pub async fn interruptible<T, W, S>(shutdown: S, work: W) -> Completion<T>
where
    W: Future<Output = T>,
    S: Future<Output = ()>,
{
    tokio::select! {
        value = work => Completion::Finished(value),
        () = shutdown => {
            println!("\nReceived termination signal. Cleaning up...");
            Completion::Interrupted
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
