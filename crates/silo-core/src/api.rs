//! Typed API surface
//!
//! A closed request/response pair instead of an open property bag: every
//! operation the host UI can ask for is a variant here, and dispatch is
//! one exhaustive match. Engine errors come back as the `Error` variant;
//! a tier refusal is its own success-shaped variant.

use serde::{Deserialize, Serialize};

use silo_session::{Limit, PolicyRefusal, Session, Tier};
use silo_tabs::TabId;

use crate::engine::{CreateSessionOutcome, Engine};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiRequest {
    CreateSession {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
    ListSessions,
    ReopenSession {
        session_id: String,
        #[serde(default)]
        url: Option<String>,
    },
    DeleteSession {
        session_id: String,
    },
    GetSessionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiResponse {
    Created {
        session_id: String,
        tab_id: TabId,
        color: String,
    },
    Refused(PolicyRefusal),
    Sessions {
        active: Vec<Session>,
        dormant: Vec<Session>,
    },
    Reopened {
        session_id: String,
        tab_id: TabId,
    },
    Deleted {
        session_id: String,
    },
    Status {
        active_count: usize,
        limit: Limit,
        tier: Tier,
    },
    Error {
        message: String,
    },
}

pub async fn dispatch(engine: &Engine, request: ApiRequest) -> ApiResponse {
    match request {
        ApiRequest::CreateSession { name, url } => {
            match engine.create_session(name, url.as_deref()).await {
                Ok(CreateSessionOutcome::Created {
                    session_id,
                    tab_id,
                    color,
                }) => ApiResponse::Created {
                    session_id,
                    tab_id,
                    color,
                },
                Ok(CreateSessionOutcome::Refused(refusal)) => ApiResponse::Refused(refusal),
                Err(e) => error_response(e),
            }
        }

        ApiRequest::ListSessions => {
            let (active, dormant) = engine.list_sessions();
            ApiResponse::Sessions { active, dormant }
        }

        ApiRequest::ReopenSession { session_id, url } => {
            match engine.reopen_session(&session_id, url.as_deref()).await {
                Ok(tab_id) => ApiResponse::Reopened { session_id, tab_id },
                Err(e) => error_response(e),
            }
        }

        ApiRequest::DeleteSession { session_id } => {
            match engine.delete_session(&session_id).await {
                Ok(()) => ApiResponse::Deleted { session_id },
                Err(e) => error_response(e),
            }
        }

        ApiRequest::GetSessionStatus => {
            let status = engine.status();
            ApiResponse::Status {
                active_count: status.active_count,
                limit: status.limit,
                tier: status.tier,
            }
        }
    }
}

fn error_response(e: crate::CoreError) -> ApiResponse {
    ApiResponse::Error {
        message: e.to_string(),
    }
}
