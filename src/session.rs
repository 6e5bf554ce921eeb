//! Session construction on the host's own execution context.
//!
//! Engines that insist on thread affinity for session creation get it here:
//! the tick thread sends a [`SessionRequest`] to whichever context runs the
//! [`SessionHost`], then polls the returned [`PendingSession`] once per tick
//! until the engine arrives. Polling never blocks.

use std::sync::mpsc;
use std::thread;

use crate::config::SessionConfig;
use crate::engine::TrackingEngine;
use crate::error::{ArError, Result};
use crate::marker::MarkerDatabase;

/// Builds engines; runs on the host context only.
pub trait SessionFactory {
    type Engine: TrackingEngine + Send + 'static;

    fn create(
        &mut self,
        config: &SessionConfig,
        database: Option<&MarkerDatabase>,
    ) -> Result<Self::Engine>;
}

/// Messages from the tick thread to the session host.
pub enum SessionRequest<E> {
    /// Build a session and send it back on `reply`.
    Create {
        config: SessionConfig,
        database: Option<MarkerDatabase>,
        reply: mpsc::Sender<Result<E>>,
    },
    /// Stop a host started with [`SessionHost::spawn`].
    Shutdown,
}

impl<E> std::fmt::Debug for SessionRequest<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRequest::Create { config, database, .. } => f
                .debug_struct("Create")
                .field("config", config)
                .field("database", database)
                .field("reply", &"...")
                .finish(),
            SessionRequest::Shutdown => f.write_str("Shutdown"),
        }
    }
}

pub struct SessionHost<F: SessionFactory> {
    factory: F,
    requests: mpsc::Receiver<SessionRequest<F::Engine>>,
}

impl<F: SessionFactory> SessionHost<F> {
    pub fn new(factory: F) -> (SessionHost<F>, SessionHandle<F::Engine>) {
        let (tx, rx) = mpsc::channel();
        (
            SessionHost {
                factory,
                requests: rx,
            },
            SessionHandle { requests: tx },
        )
    }

    /// Handles every queued request without waiting; returns how many were handled.
    ///
    /// Meant to be called from the host's own loop (e.g. its UI thread).
    pub fn run_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(request) = self.requests.try_recv() {
            handled += 1;
            if !self.handle(request) {
                break;
            }
        }
        handled
    }

    /// Blocks handling requests until shutdown or until every handle is dropped.
    pub fn run(mut self) {
        while let Ok(request) = self.requests.recv() {
            if !self.handle(request) {
                break;
            }
        }
        log::debug!("session host stopped");
    }

    /// Runs the host on a dedicated thread.
    pub fn spawn(factory: F) -> Result<(SessionHandle<F::Engine>, thread::JoinHandle<()>)>
    where
        F: Send + 'static,
    {
        let (host, handle) = SessionHost::new(factory);
        let join = thread::Builder::new()
            .name("ar-session-host".to_string())
            .spawn(move || host.run())?;
        Ok((handle, join))
    }

    fn handle(&mut self, request: SessionRequest<F::Engine>) -> bool {
        match request {
            SessionRequest::Create {
                config,
                database,
                reply,
            } => {
                log::info!(
                    "creating AR session ({}x{}, augmented images: {})",
                    config.width,
                    config.height,
                    config.enable_augmented_images
                );
                let result = self.factory.create(&config, database.as_ref());
                if let Err(e) = &result {
                    log::error!("session creation failed: {}", e);
                }
                // the requester may have given up; nothing to do then
                let _ = reply.send(result);
                true
            }
            SessionRequest::Shutdown => false,
        }
    }
}

/// Tick-thread side of the session host.
pub struct SessionHandle<E> {
    requests: mpsc::Sender<SessionRequest<E>>,
}

impl<E> Clone for SessionHandle<E> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
        }
    }
}

impl<E> SessionHandle<E> {
    /// Enqueues a construction request and returns immediately.
    pub fn request_session(
        &self,
        config: SessionConfig,
        database: Option<MarkerDatabase>,
    ) -> PendingSession<E> {
        let (reply, rx) = mpsc::channel();
        if self
            .requests
            .send(SessionRequest::Create {
                config,
                database,
                reply,
            })
            .is_err()
        {
            log::warn!("session host is gone, request dropped");
        }
        PendingSession { reply: rx }
    }

    pub fn shutdown(&self) {
        let _ = self.requests.send(SessionRequest::Shutdown);
    }
}

#[derive(Debug)]
pub enum SessionPoll<E> {
    Pending,
    Ready(E),
    Failed(ArError),
}

/// One-shot completion of a [`SessionRequest::Create`].
pub struct PendingSession<E> {
    reply: mpsc::Receiver<Result<E>>,
}

impl<E> PendingSession<E> {
    pub fn poll(&self) -> SessionPoll<E> {
        match self.reply.try_recv() {
            Ok(Ok(engine)) => SessionPoll::Ready(engine),
            Ok(Err(e)) => SessionPoll::Failed(e),
            Err(mpsc::TryRecvError::Empty) => SessionPoll::Pending,
            Err(mpsc::TryRecvError::Disconnected) => SessionPoll::Failed(
                ArError::EngineUnavailable("session host dropped the request".to_string()),
            ),
        }
    }
}
