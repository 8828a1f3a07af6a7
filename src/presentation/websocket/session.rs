//! WebSocket Session State

/// Per-connection state owned by the read loop
#[derive(Debug, Clone)]
pub struct SessionState {
    pub connection_id: String,
    /// Set once the connection token was verified and presence recorded
    pub user_id: Option<i64>,
    pub frames_received: u64,
}

impl SessionState {
    pub fn new(connection_id: String) -> Self {
        Self {
            connection_id,
            user_id: None,
            frames_received: 0,
        }
    }

    pub fn authenticate(&mut self, user_id: i64) {
        self.user_id = Some(user_id);
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn frame_received(&mut self) {
        self.frames_received += 1;
    }
}
