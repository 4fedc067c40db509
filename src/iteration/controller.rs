use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::backend::LabelingBackend;
use crate::models::Session;
use crate::ocal::OracleError;
use crate::plot::HeatmapRenderer;
use crate::settings::ClientSettings;
use crate::{log_error, log_info, log_warn};

use super::events::IterationEvent;
use super::state::{IterationSnapshot, IterationState, Submission, TickOutcome};

const ENABLE_LOGS: bool = true;
const EVENT_CAPACITY: usize = 64;

struct Worker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Worker {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Drives one labeling session: the one-second clock, the oracle round
/// trips and the event stream for the view.
#[derive(Clone)]
pub struct IterationController {
    state: Arc<Mutex<Option<IterationState>>>,
    backend: Arc<dyn LabelingBackend>,
    renderer: Arc<dyn HeatmapRenderer>,
    events: broadcast::Sender<IterationEvent>,
    ticker: Arc<Mutex<Option<Worker>>>,
    selection_watch: Arc<Mutex<Option<Worker>>>,
    /// Cancelled when the view is torn down; replaced on every open.
    view: Arc<Mutex<CancellationToken>>,
    tick_interval: Duration,
}

impl IterationController {
    pub fn new(
        backend: Arc<dyn LabelingBackend>,
        renderer: Arc<dyn HeatmapRenderer>,
        tick_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(None)),
            backend,
            renderer,
            events,
            ticker: Arc::new(Mutex::new(None)),
            selection_watch: Arc::new(Mutex::new(None)),
            view: Arc::new(Mutex::new(CancellationToken::new())),
            tick_interval,
        }
    }

    pub fn from_settings(
        backend: Arc<dyn LabelingBackend>,
        renderer: Arc<dyn HeatmapRenderer>,
        settings: &ClientSettings,
    ) -> Self {
        Self::new(backend, renderer, settings.tick_interval())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IterationEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: IterationEvent) {
        // No subscriber is not an error.
        let _ = self.events.send(event);
    }

    pub async fn snapshot(&self) -> Option<IterationSnapshot> {
        self.state.lock().await.as_ref().map(IterationState::snapshot)
    }

    pub async fn session(&self) -> Option<Session> {
        self.state.lock().await.as_ref().map(|state| state.session().clone())
    }

    async fn emit_state(&self) {
        if let Some(snapshot) = self.snapshot().await {
            self.emit(IterationEvent::StateChanged { snapshot });
        }
    }

    /// Loads a session and starts its clock once the oracle has answered.
    ///
    /// Finished sessions cannot be reopened. An unavailable oracle leaves
    /// nothing open.
    pub async fn open(&self, session_id: i64) -> Result<IterationSnapshot> {
        self.shutdown().await;
        *self.state.lock().await = None;
        let view = CancellationToken::new();
        *self.view.lock().await = view.clone();

        let session = self.backend.fetch_session(session_id).await?;
        if session.finished {
            return Err(anyhow!("session {session_id} is already finished"));
        }
        let setup = self.backend.fetch_setup(session.setup).await?;
        let dataset = self.backend.fetch_dataset(setup.dataset).await?;
        let mut state = IterationState::open(session, setup, dataset);

        let reply = self.backend.fetch_session_ocal(session_id).await?;
        if view.is_cancelled() {
            return Err(anyhow!("session {session_id} was closed while opening"));
        }
        let output = match reply.into_output() {
            Ok(output) => output,
            Err(err) => {
                log_warn!("Oracle unavailable while opening session {}: {}", session_id, err);
                self.emit(IterationEvent::OracleUnavailable {
                    message: err.to_string(),
                });
                return Err(err.into());
            }
        };
        state.apply_oracle_output(output);
        let snapshot = state.snapshot();
        *self.state.lock().await = Some(state);

        log_info!("Opened session {} at iteration {}", session_id, snapshot.iteration);
        self.show_heatmap(0).await;
        self.spawn_ticker().await;
        self.emit_state().await;
        Ok(self.snapshot().await.unwrap_or(snapshot))
    }

    pub async fn select_point(&self, index: i64) -> bool {
        let accepted = match self.state.lock().await.as_mut() {
            Some(state) => state.select_point(index),
            None => false,
        };
        if accepted {
            self.emit_state().await;
        }
        accepted
    }

    pub async fn select_label(&self, index: i64) -> bool {
        let accepted = match self.state.lock().await.as_mut() {
            Some(state) => state.select_label(index),
            None => false,
        };
        if accepted {
            self.emit_state().await;
        }
        accepted
    }

    pub async fn show_heatmap(&self, index: usize) -> Option<String> {
        let payload = self
            .state
            .lock()
            .await
            .as_mut()?
            .show_heatmap(index, self.renderer.as_ref())?;
        self.emit(IterationEvent::HeatmapReady {
            index,
            payload: payload.clone(),
        });
        Some(payload)
    }

    /// Submits the current iteration. `Ok(false)` if it was not accepted.
    pub async fn continue_iteration(&self, finish: bool) -> Result<bool> {
        let submission = match self.state.lock().await.as_mut() {
            Some(state) => state.continue_iteration(finish),
            None => None,
        };
        let Some(submission) = submission else {
            return Ok(false);
        };

        self.cancel_ticker().await;
        match submission {
            Submission::Finished(session) => {
                if let Err(err) = self.backend.update_session(&session).await {
                    self.fail(&err).await;
                    return Err(err);
                }
                log_info!("Session {} finished after {} iterations", session.id, session.iteration);
                self.emit_state().await;
                self.emit(IterationEvent::SessionFinished {
                    session_id: session.id,
                });
                self.stop_selection_watch().await;
            }
            Submission::Requery(session) => {
                self.emit_state().await;
                self.requery(&session).await?;
            }
        }
        Ok(true)
    }

    /// Undoes the last iteration. `Ok(false)` if rewinding is not allowed.
    pub async fn rewind(&self) -> Result<bool> {
        let session = match self.state.lock().await.as_mut() {
            Some(state) => state.rewind(),
            None => None,
        };
        let Some(session) = session else {
            return Ok(false);
        };

        log_info!("Rewound session {} to iteration {}", session.id, session.iteration);
        self.cancel_ticker().await;
        self.emit_state().await;
        self.requery(&session).await?;
        Ok(true)
    }

    async fn requery(&self, session: &Session) -> Result<()> {
        let view = self.view.lock().await.clone();
        let reply = self.backend.alter_session_with_ocal(session).await;
        if view.is_cancelled() {
            log_info!("Session {} was closed during an oracle call", session.id);
            return Ok(());
        }

        let output = match reply {
            Ok(reply) => reply.into_output().map_err(anyhow::Error::from),
            Err(err) => Err(err),
        };
        let output = match output {
            Ok(output) => output,
            Err(err) => {
                self.fail(&err).await;
                return Err(err);
            }
        };

        let displayed = match self.state.lock().await.as_mut() {
            Some(state) => {
                state.apply_oracle_output(output);
                state.displayed_subspace()
            }
            None => return Ok(()),
        };
        self.show_heatmap(displayed).await;
        self.spawn_ticker().await;
        self.emit_state().await;
        Ok(())
    }

    /// Closes the session view after a failure.
    async fn fail(&self, err: &anyhow::Error) {
        log_error!("Closing session view: {:#}", err);
        if let Some(state) = self.state.lock().await.as_mut() {
            state.abort();
        }
        self.shutdown().await;

        let message = err.to_string();
        let event = match err.downcast_ref::<OracleError>() {
            Some(_) => IterationEvent::OracleUnavailable { message },
            None => IterationEvent::Aborted { message },
        };
        self.emit(event);
    }

    /// Feeds point selections from a plot into the session.
    pub async fn watch_point_selection(&self, mut selections: watch::Receiver<Option<i64>>) {
        self.stop_selection_watch().await;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = selections.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let selected = *selections.borrow_and_update();
                        if let Some(index) = selected {
                            controller.select_point(index).await;
                        }
                    }
                }
            }
        });
        *self.selection_watch.lock().await = Some(Worker { handle, cancel });
    }

    async fn stop_selection_watch(&self) {
        if let Some(worker) = self.selection_watch.lock().await.take() {
            worker.stop();
        }
    }

    /// Stops the clock and the selection watcher. Oracle answers still in
    /// flight are dropped.
    pub async fn shutdown(&self) {
        self.view.lock().await.cancel();
        self.cancel_ticker().await;
        self.stop_selection_watch().await;
    }

    async fn cancel_ticker(&self) {
        if let Some(worker) = self.ticker.lock().await.take() {
            worker.stop();
        }
    }

    async fn spawn_ticker(&self) {
        let view = self.view.lock().await.clone();
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(worker) = ticker_guard.take() {
            worker.stop();
        }
        if view.is_cancelled() {
            return;
        }

        // A child token, so closing the view also ends this task.
        let cancel = view.child_token();
        let token = cancel.clone();
        let controller = self.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let (outcome, snapshot) = {
                            let mut guard = controller.state.lock().await;
                            let Some(state) = guard.as_mut() else {
                                break;
                            };
                            (state.timestep(), state.snapshot())
                        };

                        match outcome {
                            TickOutcome::Idle => {}
                            TickOutcome::Ticked => controller.emit(IterationEvent::Tick { snapshot }),
                            TickOutcome::Deadline => {
                                controller.emit(IterationEvent::Tick { snapshot });
                                // Submitting cancels this task, so it runs on its own.
                                tokio::spawn(controller.clone().submit_expired());
                            }
                        }
                    }
                }
            }
        });

        *ticker_guard = Some(Worker { handle, cancel });
    }

    fn submit_expired(self) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            match self.continue_iteration(false).await {
                Ok(true) => {}
                Ok(false) => log_warn!("Answer time ran out without a selected point"),
                Err(err) => log_error!("Failed to submit expired iteration: {:#}", err),
            }
        })
    }
}
