//! Data transfer objects for requests and responses.

pub mod request;
pub mod response;

use validator::Validate;

use cloudbox_core::error::AppError;

/// Run the `validator` rules of a request body.
pub fn validate<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate()
        .map_err(|e| AppError::validation(format!("Invalid request: {e}")))
}
