use crate::application::forecast_engine::{ForecastEngine, ForecastResult, TrainingSummary};
use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Work the forecasting worker accepts
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForecastCommand {
    Train(String),
    Infer(String),
    Export(String),
    ExportAll,
    Delete(String),
    Shutdown,
}

/// Results published back to the caller. Every payload is an owned value.
#[derive(Clone, Debug)]
pub enum ForecastEvent {
    Trained(TrainingSummary),
    Forecast(ForecastResult),
    Exported { symbol: String, path: PathBuf },
    ExportedAll { path: PathBuf, symbols: Vec<String> },
    Deleted { symbol: String, models_removed: usize },
    Failed { command: ForecastCommand, error: String },
}

/// Runs a `ForecastEngine` on its own thread so an interactive front end
/// stays responsive while models fit.
pub struct ForecastClient {
    command_tx: Sender<ForecastCommand>,
    event_rx: Receiver<ForecastEvent>,
    worker: Option<JoinHandle<()>>,
}

impl ForecastClient {
    pub fn spawn(engine: Arc<ForecastEngine>) -> Self {
        let (command_tx, command_rx) = unbounded::<ForecastCommand>();
        let (event_tx, event_rx) = unbounded::<ForecastEvent>();

        let worker = thread::spawn(move || {
            info!("ForecastClient: worker started");
            for command in command_rx.iter() {
                if command == ForecastCommand::Shutdown {
                    break;
                }
                let event = execute(&engine, command);
                if event_tx.send(event).is_err() {
                    debug!("ForecastClient: event receiver dropped, stopping worker");
                    break;
                }
            }
            info!("ForecastClient: worker stopped");
        });

        Self {
            command_tx,
            event_rx,
            worker: Some(worker),
        }
    }

    pub fn send(&self, command: ForecastCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| anyhow::anyhow!("Failed to send forecast command: {}", e))
    }

    /// Non-blocking check for the next finished result
    pub fn poll_next(&self) -> Option<ForecastEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Blocks until the next result arrives or the worker has stopped
    pub fn wait_next(&self) -> Option<ForecastEvent> {
        self.event_rx.recv().ok()
    }

    /// Stops the worker after the queued commands and waits for it
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.command_tx.send(ForecastCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for ForecastClient {
    fn drop(&mut self) {
        self.stop();
    }
}

fn execute(engine: &ForecastEngine, command: ForecastCommand) -> ForecastEvent {
    let failed = |command: ForecastCommand, error: String| ForecastEvent::Failed { command, error };

    match &command {
        ForecastCommand::Train(symbol) => match engine.train_symbol(symbol) {
            Ok(summary) => ForecastEvent::Trained(summary),
            Err(e) => failed(command.clone(), e.to_string()),
        },
        ForecastCommand::Infer(symbol) => match engine.run_inference(symbol) {
            Ok(result) => ForecastEvent::Forecast(result),
            Err(e) => failed(command.clone(), e.to_string()),
        },
        ForecastCommand::Export(symbol) => match engine.export_package(symbol) {
            Ok(path) => ForecastEvent::Exported {
                symbol: symbol.clone(),
                path,
            },
            Err(e) => failed(command.clone(), e.to_string()),
        },
        ForecastCommand::ExportAll => match engine.export_all_packages() {
            Ok(bulk) => ForecastEvent::ExportedAll {
                path: bulk.export_dir,
                symbols: bulk.exported,
            },
            Err(e) => failed(command.clone(), e.to_string()),
        },
        ForecastCommand::Delete(symbol) => match engine.delete_package(symbol) {
            Ok(models_removed) => ForecastEvent::Deleted {
                symbol: symbol.clone(),
                models_removed,
            },
            Err(e) => failed(command.clone(), format!("{:#}", e)),
        },
        ForecastCommand::Shutdown => failed(command.clone(), "worker is shutting down".to_string()),
    }
}
