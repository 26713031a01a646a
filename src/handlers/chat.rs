use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::services::conversation;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub state: String,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let message = req.message.trim();
    if message.is_empty() {
        return Json(ChatResponse {
            reply: "Dime qué día y hora te vienen bien y lo miro.".to_string(),
            state: persisted_state(&state, &req.session_id),
        });
    }

    match conversation::process_message(&state, &req.session_id, message).await {
        Ok((reply, session_state)) => Json(ChatResponse {
            reply,
            state: session_state.as_str().to_string(),
        }),
        Err(e) => {
            // The session was not saved, so the dialogue can simply retry.
            tracing::error!(error = %e, session = %req.session_id, "conversation turn failed");
            Json(ChatResponse {
                reply: "Ahora mismo no puedo consultar la agenda. Inténtalo de nuevo en un momento."
                    .to_string(),
                state: persisted_state(&state, &req.session_id),
            })
        }
    }
}

/// Reads the last saved state for the paths that never ran a turn. A read
/// failure is reported, not hidden behind "idle".
fn persisted_state(state: &Arc<AppState>, session_id: &str) -> String {
    let now = state.clock.now();
    let db = state.db.lock().unwrap();
    match queries::get_session(&db, session_id, now) {
        Ok(Some(session)) => session.state().as_str().to_string(),
        Ok(None) => "idle".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, session = %session_id, "failed to read session state");
            "idle".to_string()
        }
    }
}
