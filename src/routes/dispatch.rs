use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Request, State},
    handler::Handler,
    http::Method,
    response::Response,
    routing::{self, MethodRouter},
};
use tower::ServiceExt;

use super::{serve_asset, RequestError};
use crate::{
    domain::{ApiPrefix, ParseRequestPathError, RequestPath},
    startup::AppState,
    static_assets::StaticAssets,
};

/// A fixed path under the API prefix, answering exactly one method.
pub struct ApiRoute {
    segments: Vec<String>,
    path: String,
    method: Method,
    service: MethodRouter<(), Infallible>,
}

impl ApiRoute {
    pub fn get<H, T>(prefix: &ApiPrefix, route: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let segments = prefix
            .segments()
            .iter()
            .cloned()
            .chain(route.split('/').filter(|s| !s.is_empty()).map(String::from))
            .collect();

        Self {
            segments,
            path: prefix.join(route),
            method: Method::GET,
            service: routing::get(handler),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn matches(&self, path: &RequestPath) -> bool {
        path.segments() == self.segments.as_slice()
    }

    async fn call(&self, request: Request) -> Result<Response, RequestError> {
        // HEAD is rejected here rather than left to the method router, which
        // would answer it with the GET handler
        if request.method() != self.method {
            return Err(RequestError::MethodNotAllowed {
                allow: self.method.to_string(),
            });
        }

        let response = self.service.clone().oneshot(request).await;
        Ok(response.unwrap_or_else(|never| match never {}))
    }
}

/// Which handler a normalized path is routed to.
pub enum Selected<'a> {
    Api(&'a ApiRoute),
    /// Inside the API prefix but no API route matches.
    Reserved,
    Assets,
}

/// Ordered routing: API routes in registration order, static assets last.
pub struct RouteTable {
    prefix: ApiPrefix,
    api_routes: Vec<ApiRoute>,
    assets: StaticAssets,
}

impl RouteTable {
    pub fn new(prefix: ApiPrefix, assets: StaticAssets) -> Self {
        Self {
            prefix,
            api_routes: Vec::new(),
            assets,
        }
    }

    pub fn route(mut self, route: ApiRoute) -> Self {
        self.api_routes.push(route);
        self
    }

    pub fn api_routes(&self) -> &[ApiRoute] {
        &self.api_routes
    }

    pub fn assets(&self) -> &StaticAssets {
        &self.assets
    }

    pub fn select(&self, path: &RequestPath) -> Selected<'_> {
        if !self.prefix.reserves(path) {
            return Selected::Assets;
        }
        self.api_routes
            .iter()
            .find(|route| route.matches(path))
            .map_or(Selected::Reserved, Selected::Api)
    }
}

/// Single entry point for every request.
///
/// The path is decoded and normalized once here, and both the route selection
/// and the asset lookup work on that same form.
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, RequestError> {
    let path = match RequestPath::parse(request.uri().path()) {
        Ok(path) => path,
        Err(
            e @ (ParseRequestPathError::EscapesRoot | ParseRequestPathError::ForbiddenSegment(_)),
        ) => {
            tracing::warn!("Rejected request path {}: {}", request.uri().path(), e);
            return Err(RequestError::Forbidden);
        }
        Err(ParseRequestPathError::InvalidEncoding) => return Err(RequestError::NotFound),
    };

    let table = &state.route_table;
    match table.select(&path) {
        Selected::Api(route) => route.call(request).await,
        Selected::Reserved => Err(RequestError::NotFound),
        Selected::Assets => serve_asset(table.assets(), request, &path).await,
    }
}
