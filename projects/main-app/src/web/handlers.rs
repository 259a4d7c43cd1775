use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{Html, Redirect},
};
use serde::Serialize;
use tracing::info;

use crate::{
    app_state::AppState,
    camera::{
        discovery::{self, CameraDeviceInfo},
        gate::AccessOutcome,
    },
    core::{
        errors::{AccessError, AppError},
        state::{GateSnapshot, GateView},
    },
};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn root(State(state): State<Arc<AppState>>) -> Html<String> {
    let view = state.gate.lock().await.view();
    let outcome = state.latest_outcome();
    Html(render_page(&state.config.app_name, view, outcome.as_ref()))
}

pub async fn permission(State(state): State<Arc<AppState>>) -> Json<GateSnapshot> {
    let gate = state.gate.lock().await;
    Json(gate.snapshot())
}

pub async fn request_permission(
    State(state): State<Arc<AppState>>,
) -> Result<Redirect, AppError> {
    let ticket = {
        let mut gate = state.gate.lock().await;
        let view = gate.view();
        if view == GateView::Unsupported {
            return Err(AccessError::UnsupportedEnvironment.into());
        }
        if !view.accepts_request() {
            return Err(AppError::new(
                StatusCode::CONFLICT,
                format!("camera request not accepted while {}", view.label()),
            ));
        }
        gate.begin_request()
            .ok_or(AccessError::UnsupportedEnvironment)?
    };
    let generation = ticket.generation();
    info!("camera access requested (attempt {generation})");

    // Detached so a dropped client cannot cancel the platform call; the
    // gate stays unlocked while it is pending.
    let task_state = state.clone();
    let attempt = tokio::spawn(async move {
        let result = ticket.acquire().await;
        let mut gate = task_state.gate.lock().await;
        gate.finish_request(generation, result).await;
    });
    attempt
        .await
        .map_err(|err| AppError::internal(format!("camera request task failed: {err}")))?;

    Ok(Redirect::to("/"))
}

pub async fn cameras() -> Result<Json<Vec<CameraDeviceInfo>>, AppError> {
    let list = discovery::probe_cameras()
        .await
        .context("camera probe failed")?;
    Ok(Json(list))
}

fn render_tag(view: GateView) -> String {
    format!(
        "<span id=\"gate-status\" class=\"tag {} is-medium\">{}</span>",
        view.css_class(),
        view.label()
    )
}

fn render_page(app_name: &str, view: GateView, outcome: Option<&AccessOutcome>) -> String {
    let notice = match outcome {
        Some(AccessOutcome::Denied(err)) => format!(
            "<p class=\"notification is-warning\">{}</p>",
            escape_html(&err.to_string())
        ),
        Some(AccessOutcome::Granted) => {
            "<p class=\"notification is-success\">Camera access confirmed.</p>".to_owned()
        }
        None => String::new(),
    };
    let action = match view {
        GateView::PromptNeeded => "Grant camera access",
        GateView::Denied => "Try again",
        _ => "",
    };
    let button = if view.accepts_request() {
        format!(
            "<form method=\"post\" action=\"/permission/request\"><button class=\"button is-primary\" type=\"submit\">{action}</button></form>"
        )
    } else {
        String::new()
    };

    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body><section class=\"section\"><h1 class=\"title\">{title}</h1>\n{tag}\n{notice}\n{button}\n</section></body></html>\n",
        title = escape_html(app_name),
        tag = render_tag(view),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
