//! API error types with HTTP response mapping.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, DomainError, OrderError, PaymentError};
use serde::Serialize;
use store::StoreError;

/// Field and non-field errors of a rejected form.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    pub errors: BTreeMap<String, Vec<String>>,
    pub non_field_errors: Vec<String>,
}

impl FormErrors {
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(name, message);
        errors
    }

    pub fn non_field(message: impl Into<String>) -> Self {
        Self {
            non_field_errors: vec![message.into()],
            ..Self::default()
        }
    }

    pub fn add(&mut self, name: &str, message: impl Into<String>) {
        self.errors
            .entry(name.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.non_field_errors.is_empty()
    }
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Missing or wrong staff credentials.
    Unauthorized,
    /// Submitted form failed validation.
    Validation(FormErrors),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Validation(form) => return validation_response(form),
            ApiError::Domain(err) => match domain_error_to_response(err) {
                Ok(pair) => pair,
                Err(form) => return validation_response(form),
            },
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn validation_response(form: FormErrors) -> Response {
    let body = serde_json::json!({
        "error": "Invalid form submission",
        "errors": form.errors,
        "non_field_errors": form.non_field_errors,
    });
    (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(body)).into_response()
}

/// Maps a domain error to a status and message, or to form errors when the
/// error is a validation failure.
fn domain_error_to_response(err: DomainError) -> Result<(StatusCode, String), FormErrors> {
    let message = err.to_string();
    match err {
        DomainError::Cart(cart_err) => Err(cart_form_errors(&cart_err)),
        DomainError::Catalog(catalog_err) => {
            Err(FormErrors::field(catalog_err.field(), catalog_err.to_string()))
        }
        DomainError::Payment(PaymentError::ReferenceTooLong { .. }) => {
            Err(FormErrors::field("reference", message))
        }
        DomainError::Payment(_) => Ok((StatusCode::CONFLICT, message)),
        DomainError::Order(order_err) => match order_err {
            OrderError::NotFound(_) => Ok((StatusCode::NOT_FOUND, message)),
            OrderError::NoOrderableItems | OrderError::InsufficientStock { .. } => {
                Err(FormErrors::non_field(message))
            }
            OrderError::CannotCancel { .. } | OrderError::InvalidStatusTransition { .. } => {
                Ok((StatusCode::CONFLICT, message))
            }
        },
        DomainError::Store(StoreError::NotFound { .. }) => Ok((StatusCode::NOT_FOUND, message)),
        DomainError::Store(store_err) => {
            tracing::error!(error = %store_err, "store error");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ))
        }
    }
}

/// Form errors for a rejected cart action, keyed by the offending field.
pub fn cart_form_errors(err: &CartError) -> FormErrors {
    match err {
        CartError::InvalidQuantity | CartError::InsufficientStock { .. } => {
            FormErrors::field("quantity", err.to_string())
        }
        CartError::ProductUnavailable(_) => FormErrors::field("product_id", err.to_string()),
        CartError::EmptyCart => FormErrors::non_field(err.to_string()),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<FormErrors> for ApiError {
    fn from(errors: FormErrors) -> Self {
        ApiError::Validation(errors)
    }
}
