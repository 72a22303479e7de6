//! Connector event loop.
//!
//! One task owns the [`EngineSupervisor`] and reacts, strictly one event at a
//! time, to:
//! - [`LinkEvent`]s from the remote link;
//! - [`EngineEvent`]s from the engine session tasks;
//! - cancellation.
//!
//! Because nothing else touches the supervisor, the `stop` / `position` /
//! `go` sequence of a request is queued to the engine without any other event
//! slipping in between.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::GlobalConfig;
use crate::link::client::RemoteLink;
use crate::link::{AnalysisUpdate, LinkEvent};
use crate::usi::supervisor::{EngineEvent, EngineSupervisor};
use crate::{AppError, Result};

/// Capacity of the link and engine event channels.
const EVENT_BUFFER: usize = 256;

/// Capacity of the outbound update queue. At one update per throttle window
/// it only fills while the link is reconnecting.
const UPDATE_BUFFER: usize = 16;

/// Routes link events to the engine and engine output to the link.
#[derive(Debug)]
pub struct Connector {
    supervisor: EngineSupervisor,
    update_tx: mpsc::Sender<AnalysisUpdate>,
}

impl Connector {
    /// Wrap `supervisor`; released evaluation lines go to `update_tx`.
    #[must_use]
    pub fn new(supervisor: EngineSupervisor, update_tx: mpsc::Sender<AnalysisUpdate>) -> Self {
        Self {
            supervisor,
            update_tx,
        }
    }

    /// The owned supervisor.
    #[must_use]
    pub fn supervisor(&self) -> &EngineSupervisor {
        &self.supervisor
    }

    /// React to one link event.
    ///
    /// Every successful (re)connection restarts the engine from scratch.
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => {
                info!("server link established, starting engine");
                match self.supervisor.start() {
                    Ok(()) => {}
                    Err(AppError::EngineNotFound(path)) => {
                        error!(
                            path = %path.display(),
                            "engine executable not found; check engine_path in the config file"
                        );
                    }
                    Err(err) => error!(%err, "failed to start engine"),
                }
            }
            LinkEvent::Disconnected { reason } => {
                debug!(%reason, "server link lost, engine keeps running");
            }
            LinkEvent::RequestAnalysis(request) => self.supervisor.request_analysis(&request.sfen),
            LinkEvent::StopAnalysis => self.supervisor.stop_analysis(),
        }
    }

    /// React to one engine event, relaying any released evaluation line.
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        let Some(info) = self.supervisor.handle_event(event) else {
            return;
        };
        if let Err(err) = self.update_tx.try_send(AnalysisUpdate { info }) {
            debug!(%err, "update queue unavailable, dropping analysis update");
        }
    }

    /// Stop the engine and wait for it to exit.
    pub async fn shutdown(&mut self) {
        self.supervisor.shutdown().await;
    }
}

/// Run the connector until `cancel` fires.
///
/// # Errors
///
/// Returns `AppError::Config` if the engine options cannot be rendered.
pub async fn run(config: &GlobalConfig, cancel: CancellationToken) -> Result<()> {
    let engine = config.engine_config()?;
    let connection = config.connection_config();

    let (engine_tx, mut engine_rx) = mpsc::channel(EVENT_BUFFER);
    let (link_tx, mut link_rx) = mpsc::channel(EVENT_BUFFER);
    let (update_tx, update_rx) = mpsc::channel(UPDATE_BUFFER);

    let mut connector = Connector::new(EngineSupervisor::new(engine, engine_tx), update_tx);
    let link = RemoteLink::new(connection).spawn(link_tx, update_rx, cancel.clone());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Some(event) = engine_rx.recv() => connector.handle_engine_event(event),

            Some(event) = link_rx.recv() => connector.handle_link_event(event),
        }
    }

    info!("shutting down");
    connector.shutdown().await;
    let _ = link.await;
    Ok(())
}
