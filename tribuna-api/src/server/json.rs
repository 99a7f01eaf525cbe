use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    extract::FromRequest,
    http::header::{self, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Body wrapper used for every JSON endpoint. Extraction delegates to axum's
/// extractor but funnels rejections through [`ServerError`], so malformed
/// bodies get the service's error shape; a failed serialization on the way
/// out takes the same path instead of producing a bare 500.
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        let body = match serde_json::to_vec(&self.0) {
            Ok(body) => body,
            Err(err) => return ServerError::JsonResponse(err).into_response(),
        };

        (
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde::Serializer;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("always fails"))
        }
    }

    #[test]
    fn responses_carry_the_json_content_type() {
        let response = Json(vec![1, 2, 3]).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn serialization_failures_take_the_error_path() {
        let response = Json(Unserializable).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
