use std::{env, net::SocketAddr, time::Duration};

use anyhow::Context;
use tracing::Level;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub bind_addr: SocketAddr,
    pub camera_device: String,
    pub camera_input_format: String,
    pub acquire_settle: Duration,
    pub notify_on_denied_query: bool,
    pub log_level: Level,
}

fn non_blank(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let app_name = non_blank("APP_NAME").unwrap_or_else(|| "CameraGate".to_owned());
        let bind_addr = non_blank("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_owned())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address")?;

        let camera_device =
            non_blank("CAMERA_DEVICE").unwrap_or_else(|| "/dev/video0".to_owned());
        let camera_input_format =
            non_blank("CAMERA_INPUT_FORMAT").unwrap_or_else(|| "mjpeg".to_owned());

        let acquire_settle_ms = match non_blank("ACQUIRE_SETTLE_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("ACQUIRE_SETTLE_MS must be a whole number of milliseconds")?,
            None => 750,
        };
        let notify_on_denied_query = match non_blank("NOTIFY_ON_DENIED_QUERY") {
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("NOTIFY_ON_DENIED_QUERY is not a boolean: {raw}"))?,
            None => false,
        };
        let log_level = match non_blank("LOG_LEVEL") {
            Some(raw) => raw
                .parse::<Level>()
                .with_context(|| format!("LOG_LEVEL is not a tracing level: {raw}"))?,
            None => Level::INFO,
        };

        Ok(Self {
            app_name,
            bind_addr,
            camera_device,
            camera_input_format,
            acquire_settle: Duration::from_millis(acquire_settle_ms),
            notify_on_denied_query,
            log_level,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
