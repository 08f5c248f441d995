use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    body::Bytes,
    extract::{FromRequest, FromRequestParts},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use axum_extra::{TypedHeader, extract::Query as ExtraQuery};
use headers::ContentType;
use serde::Serialize;

/// JSON extractor and response whose failures go through [`ServerError`].
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

/// Query string extractor whose failures go through [`ServerError`].
///
/// Repeated keys are kept, so a field can collect every value.
#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(ExtraQuery), rejection(ServerError))]
pub struct Query<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match render(&self.0) {
            Ok(body) => JsonBody(body).into_response(),
            Err(err) => err.into_response(),
        }
    }
}

pub fn render<T: Serialize>(value: &T) -> Result<Bytes, ServerError> {
    Ok(serde_json::to_vec(value)?.into())
}

/// An already serialized JSON document.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct JsonBody(pub Bytes);

impl IntoResponse for JsonBody {
    fn into_response(self) -> Response {
        (TypedHeader(ContentType::json()), self.0).into_response()
    }
}

/// `302 Found` pointing at an already encoded location.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Found(pub String);

impl IntoResponse for Found {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(LOCATION, self.0)]).into_response()
    }
}
