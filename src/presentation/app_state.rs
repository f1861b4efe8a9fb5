// Application state for HTTP handlers
use crate::application::session::SessionHandle;
use std::collections::HashMap;

pub struct AppState {
    pub sessions: HashMap<String, SessionHandle>,
}

impl AppState {
    pub fn session(&self, collar_id: &str) -> Option<&SessionHandle> {
        self.sessions.get(collar_id)
    }

    pub fn collar_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }
}
