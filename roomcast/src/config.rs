//! Client configuration types and defaults

/// Configuration for a room session
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the signaling server
    pub server_url: String,
    /// Display name announced to the room
    pub user_name: String,
    /// Room to join on connect
    pub room_id: String,
}

impl ClientConfig {
    /// Build a config for the given room and display name against the
    /// default local server address
    pub fn new(room_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            server_url: "ws://127.0.0.1:3000".to_string(),
            user_name: user_name.into(),
            room_id: room_id.into(),
        }
    }

    /// Override the signaling server URL
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }
}
