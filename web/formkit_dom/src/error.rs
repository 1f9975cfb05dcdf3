use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed protocol json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport failure: {0}")]
    Io(#[from] io::Error),

    #[error("outbound queue disconnected")]
    Disconnected,
}
