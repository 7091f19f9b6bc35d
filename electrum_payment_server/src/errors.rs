use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use electrum_payment_engine::PaymentsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid server configuration. {0}")]
    Configuration(String),
    #[error("Could not initialize the store. {0}")]
    StoreInit(String),
    #[error("Payment engine error. {0}")]
    Engine(#[from] PaymentsError),
    #[error("An I/O error happened in the server. {0}")]
    Io(#[from] std::io::Error),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(self.to_string())
    }
}
