use hidd_discovery::DiscoveryError;
use hidd_session::{HandoffError, PairingError, ResolutionError};
use hidd_transport::TransportError;

/// Why a run ended unsuccessfully. Each variant maps to a process exit
/// status.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("setup failed: {0}")]
    Setup(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Resolution(ResolutionError),

    #[error(transparent)]
    Handoff(HandoffError),

    #[error(transparent)]
    Discovery(DiscoveryError),

    /// Channels opened but did not form a usable pair.
    #[error(transparent)]
    Pairing(PairingError),
}

impl RunError {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Setup(_) => 1,
            RunError::Transport(_) | RunError::Pairing(_) => 2,
            RunError::Resolution(_) => 3,
            RunError::Handoff(_) => 4,
            RunError::Discovery(_) => 5,
        }
    }
}

impl From<PairingError> for RunError {
    fn from(err: PairingError) -> Self {
        match err {
            PairingError::Transport(e) => RunError::Transport(e),
            PairingError::Resolution(e) => RunError::Resolution(e),
            PairingError::Handoff(HandoffError::ControlSocket(e)) => {
                RunError::Setup(format!("HIDP control socket: {e}"))
            }
            PairingError::Handoff(e) => RunError::Handoff(e),
            other => RunError::Pairing(other),
        }
    }
}

impl From<DiscoveryError> for RunError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::NoAdapter(_)
            | DiscoveryError::Hci(_)
            | DiscoveryError::InvalidLength(_) => RunError::Setup(err.to_string()),
            other => RunError::Discovery(other),
        }
    }
}
