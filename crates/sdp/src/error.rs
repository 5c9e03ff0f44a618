//! Error types for SDP queries.

/// Errors produced by the SDP client.
#[derive(Debug, thiserror::Error)]
pub enum SdpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed SDP data: {0}")]
    Malformed(String),

    #[error("peer returned SDP error 0x{0:04x}")]
    Remote(u16),

    #[error("unexpected SDP PDU 0x{0:02x}")]
    UnexpectedPdu(u8),

    #[error("SDP transaction mismatch: sent {expected}, got {actual}")]
    TransactionMismatch { expected: u16, actual: u16 },

    #[error("no service record for class 0x{0:04x}")]
    NotFound(u16),
}

pub(crate) fn malformed(msg: impl Into<String>) -> SdpError {
    SdpError::Malformed(msg.into())
}
