use std::sync::Arc;

use tauri::{
    plugin::{Builder, TauriPlugin},
    Manager, RunEvent, Runtime,
};

mod commands;
mod error;
mod event_bus;
mod state;

pub use error::{PlayerError, Result};
pub use event_bus::TauriEventBus;
pub use murmur_audio::{CompletionMode, PlaybackStatus, PlayerConfig};
pub use murmur_events::{
    event_names, PlaybackErrorEvent, PlaybackFinishedEvent, PlaybackStartedEvent,
};
pub use state::PlayerState;

const PLUGIN_NAME: &str = "murmur-player";

pub fn init<R: Runtime>() -> TauriPlugin<R, Option<PlayerConfig>> {
    Builder::<R, Option<PlayerConfig>>::new(PLUGIN_NAME)
        .invoke_handler(tauri::generate_handler![
            commands::enqueue_samples,
            commands::enqueue_pcm16,
            commands::enqueue_base64,
            commands::stop_playback,
            commands::get_playback_status,
            commands::list_output_devices,
        ])
        .setup(|app, api| {
            let config = api.config().clone().unwrap_or_default();
            let bus = Arc::new(TauriEventBus::new(app.app_handle().clone()));

            // A missing device must not take the host down with it.
            let state = match murmur_audio::Player::new(config, bus) {
                Ok(player) => PlayerState::new(player),
                Err(e) => {
                    tracing::error!("failed to open audio player: {}", e);
                    PlayerState::unavailable(e.to_string())
                }
            };
            app.manage(state);
            Ok(())
        })
        .on_event(|app, event| {
            if let RunEvent::Exit = event {
                if let Some(state) = app.try_state::<PlayerState>() {
                    state.shutdown();
                }
            }
        })
        .build()
}
