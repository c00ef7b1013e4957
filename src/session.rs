use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub session_id: String,
    pub user: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct SessionManager {
    current: Arc<Mutex<Option<UserSession>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Option<UserSession>>> {
        self.current
            .lock()
            .map_err(|_| AppError::Internal("session mutex poisoned".to_string()))
    }

    pub fn sign_in(&self, user: &str) -> AppResult<UserSession> {
        let user = user.trim();
        if user.is_empty() {
            return Err(AppError::Validation("user is required".to_string()));
        }
        let session = UserSession {
            session_id: Uuid::new_v4().to_string(),
            user: user.to_string(),
            started_at: Utc::now(),
        };

        let mut current = self.lock()?;
        if let Some(previous) = current.replace(session.clone()) {
            tracing::info!(session_id = %previous.session_id, "replacing active session");
        }
        tracing::info!(session_id = %session.session_id, user = %session.user, "session opened");
        Ok(session)
    }

    pub fn sign_out(&self) -> AppResult<()> {
        if let Some(previous) = self.lock()?.take() {
            tracing::info!(session_id = %previous.session_id, "session closed");
        }
        Ok(())
    }

    pub fn current(&self) -> AppResult<Option<UserSession>> {
        Ok(self.lock()?.clone())
    }

    pub fn is_active(&self) -> bool {
        self.lock().map(|current| current.is_some()).unwrap_or(false)
    }

    pub fn require_active(&self) -> AppResult<UserSession> {
        self.current()?
            .ok_or_else(|| AppError::NotFound("No active user session".to_string()))
    }
}
