use thiserror::Error;

#[derive(Debug, Error)]
pub enum DarajaApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Gateway unreachable: {0}")]
    Unavailable(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Gateway rejected the request. Error {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("Gateway accepted the call but returned a non-zero response code {code}: {description}")]
    PushDeclined { code: String, description: String },
    #[error("Could not obtain an access token: {0}")]
    Authentication(String),
}

impl DarajaApiError {
    /// True when the failure came from the gateway making a decision, as opposed to the gateway being unreachable.
    /// Callers use this to pick between `GatewayRejected` and `GatewayUnavailable`.
    pub fn is_rejection(&self) -> bool {
        matches!(self, DarajaApiError::Rejected { .. } | DarajaApiError::PushDeclined { .. })
    }
}
