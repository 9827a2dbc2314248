use anyhow::Context;
use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::RequestError;
use crate::{
    domain::RequestPath,
    static_assets::{Asset, AssetResolution, ResolveAssetError, StaticAssets},
};

const ALLOWED_METHODS: &str = "GET, HEAD";

/// Serves a normalized path from the static root, with SPA fallback.
///
/// Resolution and the ETag check happen here. The file itself is streamed by
/// `ServeFile`, which also handles `Last-Modified`, `If-Modified-Since`,
/// `Range` and HEAD.
pub async fn serve_asset(
    assets: &StaticAssets,
    mut request: Request,
    path: &RequestPath,
) -> Result<Response, RequestError> {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return Err(RequestError::MethodNotAllowed {
            allow: ALLOWED_METHODS.to_string(),
        });
    }

    let (asset, is_fallback) = match assets.resolve(path).await {
        Ok(AssetResolution::Found(asset)) => (asset, false),
        Ok(AssetResolution::FallbackToRoot(asset)) => {
            tracing::debug!("Serving fallback document for {}", path);
            (asset, true)
        }
        Ok(AssetResolution::NotFound) => return Err(RequestError::NotFound),
        Err(e @ ResolveAssetError::OutsideRoot { .. }) => {
            tracing::warn!("Blocked static asset request: {}", e);
            return Err(RequestError::Forbidden);
        }
        Err(ResolveAssetError::Io(e)) => {
            return Err(anyhow::Error::from(e)
                .context("Failed to resolve static asset")
                .into())
        }
    };

    let etag = HeaderValue::from_str(&asset.etag()).context("ETag is not a valid header value")?;

    let mut response = if is_not_modified(request.headers(), &asset) {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        // If-None-Match takes precedence, a stale ETag must not be overruled
        // by a matching date
        if request.headers().contains_key(header::IF_NONE_MATCH) {
            request.headers_mut().remove(header::IF_MODIFIED_SINCE);
        }
        let file = ServeFile::new_with_mime(asset.path(), &asset.content_type());
        let response = file.oneshot(request).await;
        response.unwrap_or_else(|never| match never {}).into_response()
    };

    // A file removed since resolution comes back as a plain 404
    let status = response.status();
    if status.is_success() || status == StatusCode::NOT_MODIFIED {
        let headers = response.headers_mut();
        headers.insert(header::ETAG, etag);
        if is_fallback {
            // Deep links must always revalidate the entry document
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }
    }

    Ok(response)
}

fn is_not_modified(headers: &HeaderMap, asset: &Asset) -> bool {
    let etag = asset.etag();
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|tag| tag.trim())
        .any(|tag| tag == "*" || tag.trim_start_matches("W/") == etag)
}
