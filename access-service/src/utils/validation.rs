use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::dtos::ErrorResponse;

/// JSON body extractor that runs `validator` rules before the handler sees the value.
///
/// Rejections name the offending fields and rule codes only. Submitted values
/// (passwords included) never appear in the response.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| reject(StatusCode::BAD_REQUEST, body_problem(&rejection)))?;

        value.validate().map_err(|errors| {
            reject(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Validation failed: {}", summarize(&errors)),
            )
        })?;

        Ok(ValidatedJson(value))
    }
}

fn reject(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn body_problem(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => "Expected an application/json body",
        JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON",
        JsonRejection::JsonDataError(_) => "Request body has missing or mistyped fields",
        _ => "Failed to read request body",
    }
    .to_string()
}

/// `field (rule)` pairs, sorted by field name.
fn summarize(errors: &ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let codes: Vec<&str> = errs.iter().map(|e| e.code.as_ref()).collect();
            format!("{} ({})", field, codes.join(", "))
        })
        .collect();
    fields.sort();
    fields.join("; ")
}
