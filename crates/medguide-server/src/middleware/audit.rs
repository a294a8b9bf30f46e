use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Whom a request is about, read from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject<'a> {
    Session(&'a str),
    Patient(&'a str),
    None,
}

impl<'a> Subject<'a> {
    pub fn from_path(path: &'a str) -> Self {
        let mut segments = path.trim_start_matches('/').split('/');
        match (segments.next(), segments.next()) {
            (Some("sessions"), Some(id)) if !id.is_empty() => Subject::Session(id),
            (Some("patients"), Some(id)) if !id.is_empty() => Subject::Patient(id),
            _ => Subject::None,
        }
    }

    pub fn session_id(self) -> Option<&'a str> {
        match self {
            Subject::Session(id) => Some(id),
            _ => None,
        }
    }

    pub fn patient_id(self) -> Option<&'a str> {
        match self {
            Subject::Patient(id) => Some(id),
            _ => None,
        }
    }
}

/// One structured event per request, keyed by route template and the
/// session or patient it concerns. Utterances, answers and plans are never
/// logged here.
pub async fn audit_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let subject = Subject::from_path(&path);
    let session_id = subject.session_id().unwrap_or("-");
    let patient_id = subject.patient_id().unwrap_or("-");
    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        tracing::warn!(%method, %route, session_id, patient_id, status, elapsed_ms, "api_request");
    } else {
        tracing::info!(%method, %route, session_id, patient_id, status, elapsed_ms, "api_request");
    }

    response
}
