//! Request validation for todo payloads.

use crate::error::{AppError, HttpError};
use crate::service::CreateTodoRequest;

pub const MAX_TITLE_LEN: usize = 20;

pub struct RequestValidator;

impl RequestValidator {
    /// Title length is counted in characters.
    pub fn validate_create(req: &CreateTodoRequest) -> Result<(), AppError> {
        if req.title.chars().count() > MAX_TITLE_LEN {
            return Err(HttpError::bad_request(format!(
                "title should have maximum length of {MAX_TITLE_LEN} characters"
            ))
            .into());
        }
        Ok(())
    }
}
