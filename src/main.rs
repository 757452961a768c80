//! Demo entry point — text-mode voice companion.
//!
//! Runs the full turn loop with the device-free backends: stdin lines stand
//! in for spoken utterances ([`TypedCapture`]) and replies are printed with
//! simulated speaking time ([`ConsolePlayback`]).
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Read the dialogue credential from `VOICE_COMPANION_CREDENTIAL`.
//! 4. Build the session manager, capture and playback backends.
//! 5. Spawn the turn coordinator.
//! 6. Mirror the status/error feed to the terminal until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use voice_companion::{
    capture::TypedCapture,
    config::AppConfig,
    coordinator::{new_shared_state, Phase, TurnCoordinator},
    playback::ConsolePlayback,
    session::{ApiConnector, SessionManager},
};

/// Environment variable holding the dialogue-service credential.
const CREDENTIAL_VAR: &str = "VOICE_COMPANION_CREDENTIAL";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice companion starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Credential
    let credential = std::env::var(CREDENTIAL_VAR).unwrap_or_default();
    if credential.is_empty() {
        log::warn!("{CREDENTIAL_VAR} is not set; the companion will stay disabled");
    }

    // 4. Backends
    let sessions = SessionManager::new(Arc::new(ApiConnector::new(config.dialogue.clone())));
    let capture = Arc::new(TypedCapture::new());
    let playback = Arc::new(ConsolePlayback::from_config(&config.playback));

    // 5. Coordinator
    let state = new_shared_state();
    let (coordinator, handle) = TurnCoordinator::new(
        Arc::clone(&state),
        sessions,
        capture,
        playback,
        Duration::from_millis(config.dialogue.response_timeout_ms),
    );
    let runner = tokio::spawn(coordinator.run());

    handle.set_credential(credential);
    handle.start();

    println!("Type a line and press Enter to talk to your companion. Ctrl-C to quit.");

    // Ctrl-C tears the coordinator down, which ends the runner task.
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("interrupt received, shutting down");
                handle.shutdown();
            }
        });
    }

    // 6. Status mirror — the "presentation layer" of the demo.
    let mut last_status = String::new();
    let mut last_error = String::new();
    let mut last_phase = Phase::Idle;

    while !runner.is_finished() {
        tokio::time::sleep(Duration::from_millis(100)).await;

        let (phase, status, error) = {
            let st = state.lock().unwrap();
            (
                st.phase,
                st.feedback.status().to_string(),
                st.feedback.error().to_string(),
            )
        };

        if status != last_status && !status.is_empty() {
            println!("● {status}");
        }
        if error != last_error && !error.is_empty() {
            println!("✖ {error}");
        }

        // The text-mode capture closes after each utterance; re-arm so the
        // conversation keeps flowing without a Start button.
        if phase == Phase::Idle && last_phase == Phase::Speaking {
            handle.start();
        }

        last_status = status;
        last_error = error;
        last_phase = phase;
    }

    let _ = runner.await;
    log::info!("voice companion stopped");
    Ok(())
}
