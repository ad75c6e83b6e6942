// Warp error handling and propagation
// Courtesy of https://github.com/seanmonstar/warp/pull/909#issuecomment-1184854848
//
// Handlers return `Result<impl Reply, ApiError>` instead of rejecting: a rejection
// means "some other filter may handle this", whereas our errors are final. ApiError
// knows its status code and renders an OData error body, and `into_response`
// flattens the Result once the handler is done:
//
//   ```
//   .then(my_handler_func)
//   .map(into_response)
//   ```

use serde_json::{json, Value};
use tracing::{error, warn};
use warp::hyper::{Body, Response, StatusCode};
use warp::Reply;

use super::odata::ODATA_VERSION;
use crate::provider::ReadError;

pub const ODATA_CONTENT_TYPE: &str = "application/json;odata.metadata=minimal";
pub const ODATA_VERSION_HEADER: &str = "OData-Version";

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    NotImplemented(String),
    BadRequest(String),
    Read(ReadError),
    NextLink(url::ParseError),
}

impl From<ReadError> for ApiError {
    fn from(err: ReadError) -> Self {
        ApiError::Read(err)
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::NextLink(err)
    }
}

impl ApiError {
    fn status_code_body(self: ApiError) -> (StatusCode, String) {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::NotImplemented(msg) => (StatusCode::NOT_IMPLEMENTED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Read(e @ ReadError::Remote(_)) => {
                warn!("Remote store request failed: {e}");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            ApiError::Read(e @ ReadError::CursorOutOfRange { .. }) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Read(e @ ReadError::Translate { .. }) => {
                error!("{e}");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::NextLink(e) => {
                error!("Couldn't build the next page link: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Couldn't build the next page link: {e}"),
                )
            }
        }
    }
}

/// JSON reply with the headers every OData response carries
pub fn odata_reply(body: &Value, status: StatusCode) -> Response<Body> {
    let reply = warp::reply::with_status(warp::reply::json(body), status);
    let reply = warp::reply::with_header(reply, "content-type", ODATA_CONTENT_TYPE);
    warp::reply::with_header(reply, ODATA_VERSION_HEADER, ODATA_VERSION).into_response()
}

impl Reply for ApiError {
    fn into_response(self) -> Response<Body> {
        let (status, message) = self.status_code_body();
        let body = json!({
            "error": {
                "code": status.as_u16().to_string(),
                "message": message,
            }
        });
        odata_reply(&body, status)
    }
}

pub fn into_response<S: Reply, E: Reply>(reply_res: Result<S, E>) -> Response<Body> {
    match reply_res {
        Ok(resp) => resp.into_response(),
        Err(err) => err.into_response(),
    }
}
