use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Prompt lineage of one request: the user's original theme plus the latest evolved scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptChain {
    original_user_theme: Option<String>,
    evolved_prompt: Option<String>,
}

impl PromptChain {
    pub fn new(theme: Option<String>) -> Self {
        PromptChain {
            original_user_theme: theme,
            evolved_prompt: None,
        }
    }

    pub fn theme(&self) -> Option<&str> {
        self.original_user_theme.as_deref()
    }

    pub fn evolved(&self) -> Option<&str> {
        self.evolved_prompt.as_deref()
    }

    /// Sets the theme only if none is set yet.
    pub fn set_theme_once(&mut self, theme: &str) -> bool {
        if self.original_user_theme.is_some() {
            return false;
        }
        self.original_user_theme = Some(theme.to_string());
        true
    }

    pub fn advance(&mut self, evolved: String) {
        self.evolved_prompt = Some(evolved);
    }
}

struct SessionEntry {
    theme: String,
    touched: Instant,
}

/// Original user theme per scroll session, evicted after `ttl` of inactivity.
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Records the theme a session starts with. A new first tile restarts the session.
    pub fn begin(&self, session_id: &str, theme: &str) {
        let Ok(mut sessions) = self.sessions.lock() else {
            return;
        };
        Self::evict(&mut sessions, self.ttl);
        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                theme: theme.to_string(),
                touched: Instant::now(),
            },
        );
        log::debug!("📝 Session {} started with theme: {}", session_id, theme);
    }

    pub fn theme(&self, session_id: &str) -> Option<String> {
        let mut sessions = self.sessions.lock().ok()?;
        Self::evict(&mut sessions, self.ttl);
        let entry = sessions.get_mut(session_id)?;
        entry.touched = Instant::now();
        Some(entry.theme.clone())
    }

    pub fn reset(&self, session_id: &str) -> bool {
        match self.sessions.lock() {
            Ok(mut sessions) => sessions.remove(session_id).is_some(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict(sessions: &mut HashMap<String, SessionEntry>, ttl: Duration) {
        let before = sessions.len();
        sessions.retain(|_, entry| entry.touched.elapsed() < ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            log::debug!("🧹 Evicted {} idle sessions", evicted);
        }
    }
}
