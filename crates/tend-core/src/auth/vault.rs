//! Session persistence on top of the local store

use super::{AuthUser, Session};
use crate::storage::{keys, LocalStore};

/// Restores and records the signed-in session across restarts.
#[derive(Clone)]
pub struct SessionVault {
    local: LocalStore,
}

impl SessionVault {
    pub const fn new(local: LocalStore) -> Self {
        Self { local }
    }

    pub fn load(&self) -> Option<Session> {
        let user: Option<AuthUser> = self.local.load(keys::SESSION, None);
        user.map(|user| Session {
            user,
            calendar_token: self.calendar_token(),
        })
    }

    pub fn calendar_token(&self) -> Option<String> {
        crate::util::normalize_text_option(self.local.load(keys::CALENDAR_ACCESS_TOKEN, None))
    }

    pub fn save(&self, session: &Session) {
        if let Err(error) = self.local.save(keys::SESSION, &session.user) {
            tracing::warn!("Failed to persist session: {}", error);
        }
        let token_result = match &session.calendar_token {
            Some(token) => self.local.save(keys::CALENDAR_ACCESS_TOKEN, token),
            None => Ok(()),
        };
        if let Err(error) = token_result {
            tracing::warn!("Failed to persist calendar token: {}", error);
        }
    }

    /// Forget the calendar token only, e.g. after it expired.
    pub fn clear_calendar_token(&self) {
        if let Err(error) = self.local.remove(keys::CALENDAR_ACCESS_TOKEN) {
            tracing::warn!("Failed to clear calendar token: {}", error);
        }
    }

    pub fn clear(&self) {
        for key in [keys::SESSION, keys::CALENDAR_ACCESS_TOKEN] {
            if let Err(error) = self.local.remove(key) {
                tracing::warn!("Failed to clear {}: {}", key, error);
            }
        }
    }
}
