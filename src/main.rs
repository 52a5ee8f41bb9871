use std::sync::Arc;

use anyhow::Result;
use log::{error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};

use callmeter::{
    calibration::CalibrationPhase,
    commands::{dispatch, HostCommand},
    init_logging, settings,
    status::StatusEvent,
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    info!("callmeter starting up...");

    let data_dir = settings::data_dir();
    let state = Arc::new(AppState::bootstrap(&data_dir, None, settings::debug_mode())?);
    info!("Data directory: {}", data_dir.display());
    tokio::spawn(print_status(state.events.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_line(&state, &line).await,
                Ok(None) => {
                    error!("Telephony event source closed; no new calls will be tracked. Press Ctrl-C to exit.");
                    stdin_open = false;
                }
                Err(err) => {
                    error!("Telephony event source failed: {err}; press Ctrl-C to exit.");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    if let Some(finalized) = state.shutdown().await? {
        if finalized.persisted {
            info!("Open call with {} saved on shutdown", finalized.record.label);
        }
    }
    Ok(())
}

async fn handle_line(state: &Arc<AppState>, line: &str) {
    let command = match HostCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    if command == HostCommand::Calibrate {
        // Runs for both phases; keep reading telephony events meanwhile.
        let state = Arc::clone(state);
        tokio::spawn(async move {
            match dispatch(&state, HostCommand::Calibrate).await {
                Ok(out) => println!("{out}"),
                Err(err) => eprintln!("{err:#}"),
            }
        });
        return;
    }

    match dispatch(state, command).await {
        Ok(out) if out.is_empty() => {}
        Ok(out) => println!("{out}"),
        Err(err) => eprintln!("{err:#}"),
    }
}

/// Surfaces notices and calibration prompts on stderr.
async fn print_status(mut events: broadcast::Receiver<StatusEvent>) {
    loop {
        match events.recv().await {
            Ok(StatusEvent::Notice { message }) => eprintln!("notice: {message}"),
            Ok(StatusEvent::CalibrationProgress { phase, phase_ms }) => {
                let prompt = match phase {
                    CalibrationPhase::Silence => "stay quiet",
                    CalibrationPhase::Speech => "read aloud at your normal volume",
                };
                eprintln!("calibration: {prompt} for {}s", phase_ms / 1_000);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!("Status printer skipped {skipped} events"),
            Err(RecvError::Closed) => break,
        }
    }
}
