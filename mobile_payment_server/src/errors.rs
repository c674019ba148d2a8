use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use mobile_payment_engine::{traits::PaymentStoreError, InitiateError, ReconcileError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The payment could not be initiated. {0}")]
    PaymentRefused(String),
    #[error("A payment for this order is already in progress. {0}")]
    PaymentInProgress(String),
    #[error("The payment gateway could not process the request. {0}")]
    GatewayError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::PaymentRefused(_) => StatusCode::BAD_REQUEST,
            Self::PaymentInProgress(_) => StatusCode::CONFLICT,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<InitiateError> for ServerError {
    fn from(e: InitiateError) -> Self {
        match e {
            InitiateError::AmountOutOfRange { .. } => Self::PaymentRefused(e.to_string()),
            InitiateError::DuplicateInitiation(_) => Self::PaymentInProgress(e.to_string()),
            InitiateError::GatewayUnavailable(_) | InitiateError::GatewayRejected(_) => {
                Self::GatewayError(e.to_string())
            },
            InitiateError::Store(e) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<ReconcileError> for ServerError {
    fn from(e: ReconcileError) -> Self {
        Self::BackendError(e.to_string())
    }
}

impl From<PaymentStoreError> for ServerError {
    fn from(e: PaymentStoreError) -> Self {
        Self::BackendError(e.to_string())
    }
}
