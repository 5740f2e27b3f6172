pub mod bridge;
pub mod display;
pub mod errors;
pub mod host;
pub mod models;
pub mod operations;
pub mod runner;
pub mod settings;
pub mod status;

#[cfg(test)]
mod testing;

use crate::display::{DisplayController, Gesture};
use crate::host::{Host, NativeDialogPresenter};
use crate::models::DisplayView;
use std::path::Path;
use std::sync::Arc;
use tauri::{Emitter, Manager};
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub const DISPLAY_VIEW_EVENT: &str = "display-view";

#[derive(Clone)]
struct AppState {
    display: Arc<DisplayController>,
}

#[tauri::command]
async fn dispatch_gesture(state: tauri::State<'_, AppState>, gesture: Gesture) -> Result<DisplayView, String> {
    Ok(state.display.handle(gesture).await)
}

#[tauri::command]
async fn get_display_view(state: tauri::State<'_, AppState>) -> Result<DisplayView, String> {
    Ok(state.display.view().await)
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir().map_err(to_client_error)?;
            std::fs::create_dir_all(&app_data_dir).map_err(to_client_error)?;
            init_tracing(&app_data_dir)?;

            let config_dir = app.path().app_config_dir().map_err(to_client_error)?;
            let mut settings = settings::load_or_init(&config_dir).map_err(to_client_error)?;
            settings.file_roots.push(app_data_dir.clone());
            settings.writable_roots.push(app_data_dir.clone());
            let poll_every = settings.status_poll_interval();
            tracing::info!(
                scripts_dir = %settings.scripts_dir.display(),
                poll_secs = poll_every.as_secs(),
                "control center starting"
            );

            let host = Host::new(settings, Arc::new(NativeDialogPresenter));
            let display = Arc::new(DisplayController::new(Arc::new(host)));
            let handle = app.handle().clone();

            tauri::async_runtime::spawn({
                let display = display.clone();
                async move {
                    display.initialize().await;
                    if let Err(error) = handle.emit(DISPLAY_VIEW_EVENT, display.view().await) {
                        tracing::warn!(error = %error, "initial display view not delivered");
                    }
                    display
                        .run_status_polling(poll_every, move |view| {
                            if let Err(error) = handle.emit(DISPLAY_VIEW_EVENT, view) {
                                tracing::warn!(error = %error, "display view not delivered");
                            }
                        })
                        .await;
                }
            });

            app.manage(AppState { display });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![dispatch_gesture, get_display_view])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}

fn init_tracing(app_data_dir: &Path) -> Result<(), String> {
    let log_dir = app_data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(to_client_error)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "control-center.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(to_client_error)
}

fn to_client_error(error: impl std::fmt::Display) -> String {
    error.to_string()
}
