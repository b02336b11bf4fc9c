//! Query API Routes
//!
//! The same wire interface remote query services expose, so one federated
//! node can be used as a backend by another.
//!
//! - POST /queryApi/v1/search - Run a federated search
//! - POST /queryApi/v1/dataSource - Fields of an auto-index

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::query::{DocRef, SearchRequest, ServiceUser};
use crate::search::SearchError;

/// Header naming the user a request is made for
pub const USER_HEADER: &str = "x-autoindex-user";

/// User from the request headers, forwarding any bearer token
pub fn service_user(headers: &HeaderMap) -> ServiceUser {
    let name = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous");
    let user = ServiceUser::new(name);

    match headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        Some(token) => user.token(token.trim()),
        None => user,
    }
}

/// POST /queryApi/v1/search
///
/// Answers 204 when every sub-request failed.
pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Response> {
    let user = service_user(&headers);

    match state.search.search(&user, &request).await {
        Ok(response) => Ok(Json(response).into_response()),
        Err(SearchError::NoResponse) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => Err(e.into()),
    }
}

/// POST /queryApi/v1/dataSource
pub async fn data_source(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(doc_ref): Json<DocRef>,
) -> ApiResult<Response> {
    let user = service_user(&headers);

    Ok(match state.search.data_source(&user, &doc_ref).await? {
        Some(data_source) => Json(data_source).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_service_user_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(service_user(&headers), ServiceUser::new("anonymous"));

        headers.insert(USER_HEADER, HeaderValue::from_static("alice"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(service_user(&headers), ServiceUser::new("alice").token("abc123"));
    }
}
