use std::sync::Arc;

use camera_gate::{
    app_state::AppState,
    camera::{self, v4l2_backend::V4l2Platform},
    config::AppConfig,
    web,
};
use tracing::info;
use tracing_appender::rolling;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    if std::env::args().any(|arg| arg == "--probe-cameras") {
        let cameras = camera::discovery::probe_cameras().await?;
        println!("{}", serde_json::to_string_pretty(&cameras)?);
        return Ok(());
    }

    let config = AppConfig::from_env()?;

    tokio::fs::create_dir_all("logs").await?;
    let file_appender = rolling::daily("logs", "camera-gate.log");
    let (non_blocking, _log_guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .init();

    let platform = V4l2Platform::new(
        config.camera_device.clone(),
        config.camera_input_format.clone(),
        config.acquire_settle,
    );
    info!(
        "{} gating camera {}",
        config.app_name,
        platform.device().display()
    );

    let state = Arc::new(AppState::new(config.clone(), Arc::new(platform)));
    state.mount_gate().await;
    let mounted = state.gate.lock().await.status();
    info!("camera gate mounted: {mounted:?}");

    let app = web::routes::build_router(state);
    info!("{} listening on {}", config.app_name, config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
