//! Session registry and lifecycle arbiter
//!
//! Tracks the single controller slot and the viewer map, and owns the
//! pipeline lifecycle: the pipeline runs exactly while at least one session
//! exists. One mutex guards all of it; handlers never hold it across
//! network or ICE waits, and a new pipeline run waits out the previous
//! teardown with the lock released.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use super::{controller, viewer, Role, Session, SessionId};
use crate::clipboard::ClipboardSyncFactory;
use crate::error::AppError;
use crate::input::InputInjectorFactory;
use crate::pipeline::{PipelineEngine, PipelineHandle};
use crate::rtc::SharedTracks;

/// Overall deadline for ICE gathering before the answer is produced.
const ICE_GATHER_DEADLINE: Duration = Duration::from_secs(10);

struct Inner {
    controller: Option<Arc<Session>>,
    viewers: HashMap<SessionId, Arc<Session>>,
    /// Admissions in flight: sessions past `ensure_pipeline` but not yet
    /// installed. While nonzero the pipeline must not be stopped, even if
    /// a departing watchdog sees an empty registry.
    pending: usize,
    /// `Some` while the pipeline is running
    pipeline: Option<PipelineHandle>,
    /// True once the most recent pipeline run has released its resources
    pipe_done: watch::Receiver<bool>,
}

/// Point-in-time registry view, for logs and tests.
#[derive(Debug, Clone)]
pub struct RegistryStatus {
    pub controller: Option<SessionId>,
    pub viewers: usize,
    pub pipeline_running: bool,
}

pub struct SessionRegistry {
    engine: PipelineEngine,
    input_factory: Option<InputInjectorFactory>,
    clipboard_factory: Option<ClipboardSyncFactory>,
    /// Self-reference handed to watchdog tasks
    weak: Weak<SessionRegistry>,
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    pub fn new(
        engine: PipelineEngine,
        input_factory: Option<InputInjectorFactory>,
        clipboard_factory: Option<ClipboardSyncFactory>,
    ) -> Arc<Self> {
        // Pre-resolved done flag: there is no previous run to wait for.
        let (done_tx, done_rx) = watch::channel(true);
        drop(done_tx);
        Arc::new_cyclic(|weak| Self {
            engine,
            input_factory,
            clipboard_factory,
            weak: weak.clone(),
            inner: Mutex::new(Inner {
                controller: None,
                viewers: HashMap::new(),
                pending: 0,
                pipeline: None,
                pipe_done: done_rx,
            }),
        })
    }

    /// Admit (or replace) the controller: close any previous controller,
    /// make sure the pipeline is running, build the session against the
    /// current tracks and drive the SDP handshake. Returns the session id
    /// and the full SDP answer.
    pub async fn attach_controller(&self, offer: String) -> crate::Result<(SessionId, String)> {
        let tracks = self.ensure_pipeline(true).await?;

        let id = Uuid::new_v4().to_string();
        let sess = match controller::new_controller(
            id.clone(),
            self.engine.config().codec,
            &tracks,
            self.input_factory.clone(),
            self.clipboard_factory.clone(),
        )
        .await
        {
            Ok(sess) => sess,
            Err(e) => {
                self.abort_attach().await;
                return Err(e);
            }
        };

        let answer = match sess.negotiate(offer, ICE_GATHER_DEADLINE).await {
            Ok(answer) => answer,
            Err(e) => {
                sess.close().await;
                self.abort_attach().await;
                return Err(e);
            }
        };

        // A concurrent attach may have installed another controller while
        // the handshake ran; it loses the slot and gets closed in turn.
        let displaced = {
            let mut inner = self.inner.lock().await;
            inner.pending -= 1;
            inner.controller.replace(sess.clone())
        };
        if let Some(displaced) = displaced {
            info!(id = %displaced.id, "controller displaced by concurrent attach");
            displaced.close().await;
        }

        self.watch(sess);
        info!(id = %id, "controller attached");
        Ok((id, answer))
    }

    /// Admit a viewer. Mirrors controller admission without the
    /// replacement step.
    pub async fn attach_viewer(&self, offer: String) -> crate::Result<(SessionId, String)> {
        let tracks = self.ensure_pipeline(false).await?;

        let id = Uuid::new_v4().to_string();
        let sess = match viewer::new_viewer(id.clone(), self.engine.config().codec, &tracks).await {
            Ok(sess) => sess,
            Err(e) => {
                self.abort_attach().await;
                return Err(e);
            }
        };

        let answer = match sess.negotiate(offer, ICE_GATHER_DEADLINE).await {
            Ok(answer) => answer,
            Err(e) => {
                sess.close().await;
                self.abort_attach().await;
                return Err(e);
            }
        };

        {
            let mut inner = self.inner.lock().await;
            inner.pending -= 1;
            inner.viewers.insert(id.clone(), sess.clone());
        }
        self.watch(sess);
        info!(id = %id, "viewer attached");
        Ok((id, answer))
    }

    /// Best-effort trickle: add every `a=candidate:` line from the SDP
    /// fragment, ignoring malformed candidates.
    pub async fn trickle(&self, id: &str, role: Role, body: &str) -> crate::Result<()> {
        let sess = self
            .find(id, role)
            .await
            .ok_or_else(|| AppError::NotFound(format!("{role} session {id}")))?;

        for candidate in candidate_lines(body) {
            if let Err(e) = sess.add_remote_candidate(candidate).await {
                debug!(id = %id, "ignoring trickle candidate: {e}");
            }
        }
        Ok(())
    }

    /// Explicit departure: close the session, remove it, stop the pipeline
    /// if it was the last one.
    pub async fn detach(&self, id: &str, role: Role) -> crate::Result<()> {
        let mut inner = self.inner.lock().await;
        let sess = match role {
            Role::Controller => match &inner.controller {
                Some(c) if c.id == id => inner.controller.take(),
                _ => None,
            },
            Role::Viewer => inner.viewers.remove(id),
        };
        let Some(sess) = sess else {
            return Err(AppError::NotFound(format!("{role} session {id}")));
        };

        sess.close().await;
        Self::stop_if_idle_locked(&mut inner);
        Ok(())
    }

    /// Stop the pipeline when no session remains.
    pub async fn stop_if_idle(&self) {
        let mut inner = self.inner.lock().await;
        Self::stop_if_idle_locked(&mut inner);
    }

    /// Close everything and wait for the pipeline to release its resources.
    pub async fn teardown(&self) {
        let mut done = {
            let mut inner = self.inner.lock().await;
            if let Some(ctrl) = inner.controller.take() {
                ctrl.close().await;
            }
            let viewers: Vec<_> = inner.viewers.drain().map(|(_, v)| v).collect();
            for v in viewers {
                v.close().await;
            }
            if let Some(pipeline) = inner.pipeline.take() {
                pipeline.stop();
            }
            inner.pipe_done.clone()
        };
        let _ = done.wait_for(|done| *done).await;
    }

    pub async fn status(&self) -> RegistryStatus {
        let inner = self.inner.lock().await;
        RegistryStatus {
            controller: inner.controller.as_ref().map(|c| c.id.clone()),
            viewers: inner.viewers.len(),
            pipeline_running: inner.pipeline.is_some(),
        }
    }

    /// Make sure a pipeline run exists and return its tracks, counting the
    /// caller as an admission in flight. When a previous run is still
    /// tearing down, the registry lock is released while waiting, then
    /// state is re-checked from scratch.
    async fn ensure_pipeline(&self, replace_controller: bool) -> crate::Result<SharedTracks> {
        loop {
            let mut inner = self.inner.lock().await;

            if replace_controller {
                if let Some(old) = inner.controller.take() {
                    info!(id = %old.id, "replacing existing controller");
                    old.close().await;
                }
            }

            if let Some(pipeline) = &inner.pipeline {
                let tracks = pipeline.tracks.clone();
                inner.pending += 1;
                return Ok(tracks);
            }

            let mut done = inner.pipe_done.clone();
            if !*done.borrow() {
                drop(inner);
                let _ = done.wait_for(|done| *done).await;
                continue;
            }

            let handle = self.engine.start()?;
            let tracks = handle.tracks.clone();
            inner.pipe_done = handle.done.clone();
            inner.pipeline = Some(handle);
            inner.pending += 1;
            return Ok(tracks);
        }
    }

    /// Roll back a failed admission and stop the pipeline if that left it
    /// without sessions.
    async fn abort_attach(&self) {
        let mut inner = self.inner.lock().await;
        inner.pending -= 1;
        Self::stop_if_idle_locked(&mut inner);
    }

    fn stop_if_idle_locked(inner: &mut Inner) {
        if inner.controller.is_none() && inner.viewers.is_empty() && inner.pending == 0 {
            if let Some(pipeline) = inner.pipeline.take() {
                pipeline.stop();
                info!("pipeline stopping (no sessions)");
            }
        }
    }

    async fn find(&self, id: &str, role: Role) -> Option<Arc<Session>> {
        let inner = self.inner.lock().await;
        match role {
            Role::Controller => inner.controller.clone().filter(|c| c.id == id),
            Role::Viewer => inner.viewers.get(id).cloned(),
        }
    }

    /// Watchdog: when the session's stop signal fires (peer failure or
    /// explicit close), deregister it and stop the pipeline if idle.
    fn watch(&self, sess: Arc<Session>) {
        let registry = self.weak.clone();
        tokio::spawn(async move {
            sess.stopped().await;
            if let Some(registry) = registry.upgrade() {
                registry.deregister(&sess).await;
            }
        });
    }

    async fn deregister(&self, sess: &Session) {
        let mut inner = self.inner.lock().await;
        let removed = match sess.role {
            Role::Controller => match &inner.controller {
                Some(c) if c.id == sess.id => {
                    inner.controller = None;
                    true
                }
                _ => false,
            },
            Role::Viewer => inner.viewers.remove(&sess.id).is_some(),
        };
        if removed {
            info!(id = %sess.id, role = %sess.role, "session departed");
        }
        Self::stop_if_idle_locked(&mut inner);
    }
}

/// Extract candidate attribute values (`a=` stripped) from a trickle body.
pub(crate) fn candidate_lines(body: &str) -> Vec<&str> {
    body.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("a=candidate:"))
        .map(|line| &line[2..])
        .collect()
}
