//! The guard as a tower Layer + Service.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Router;
use axum::extract::Request;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use sysguard_core::{Admission, Guard, Sampler, Settings};
use tower::ServiceExt;
use tracing::error;

use crate::error::LayerError;
use crate::request::{HttpRequest, internal_redirect};

// ============================================================
// Layer
// ============================================================

/// Admission-control layer. Build it with [`SysguardLayer::builder`].
#[derive(Clone)]
pub struct SysguardLayer {
    guard: Guard,
    named: Arc<HashMap<String, Router>>,
}

impl SysguardLayer {
    pub fn builder(settings: impl Into<Arc<Settings>>) -> SysguardLayerBuilder {
        SysguardLayerBuilder {
            settings: settings.into(),
            sampler: None,
            named: HashMap::new(),
        }
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }
}

impl<S> tower::Layer<S> for SysguardLayer {
    type Service = SysguardService<S>;
    fn layer(&self, inner: S) -> Self::Service {
        SysguardService {
            inner,
            guard: self.guard.clone(),
            named: self.named.clone(),
        }
    }
}

/// Builder for [`SysguardLayer`].
pub struct SysguardLayerBuilder {
    settings: Arc<Settings>,
    sampler: Option<Arc<Sampler>>,
    named: HashMap<String, Router>,
}

impl SysguardLayerBuilder {
    /// Uses `sampler` instead of the process-wide `/proc` sampler.
    pub fn sampler(mut self, sampler: Arc<Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Registers the handler for `action=@alias`.
    ///
    /// The handler receives the tripped request unchanged.
    pub fn named<T>(mut self, alias: impl Into<String>, service: T) -> Self
    where
        T: tower::Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
        T::Response: IntoResponse,
        T::Future: Send + 'static,
    {
        self.named
            .insert(alias.into(), Router::new().fallback_service(service));
        self
    }

    /// Checks every configured action against what this layer can serve.
    pub fn build(self) -> Result<SysguardLayer, LayerError> {
        for alias in self.settings.named_actions() {
            if !self.named.contains_key(alias) {
                return Err(LayerError::UnknownNamedHandler(alias.to_string()));
            }
        }

        for path in self.settings.redirect_targets() {
            if path.parse::<Uri>().is_err() {
                return Err(LayerError::InvalidRedirect(path.to_string()));
            }
        }

        let sampler = self.sampler.unwrap_or_else(sysguard_core::system_sampler);
        Ok(SysguardLayer {
            guard: Guard::new(self.settings, sampler),
            named: Arc::new(self.named),
        })
    }
}

// ============================================================
// Service
// ============================================================

#[derive(Clone)]
pub struct SysguardService<S> {
    inner: S,
    guard: Guard,
    named: Arc<HashMap<String, Router>>,
}

impl<S> tower::Service<Request> for SysguardService<S>
where
    S: tower::Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        match self.guard.handle(&mut HttpRequest(&mut req)) {
            Admission::Decline => {
                let mut inner = self.inner.clone();
                Box::pin(async move { inner.call(req).await })
            }
            Admission::ServiceUnavailable => {
                Box::pin(async { Ok(StatusCode::SERVICE_UNAVAILABLE.into_response()) })
            }
            Admission::Redirect(path) => match internal_redirect(req, &path) {
                // Back through this service: the marker makes the guard
                // decline, and the inner router routes the new URI.
                Ok(req) => self.clone().call(req),
                Err(e) => {
                    error!(path = %path, error = %e, "sysguard redirect failed");
                    Box::pin(async { Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response()) })
                }
            },
            Admission::Named(alias) => match self.named.get(&alias) {
                Some(handler) => {
                    let handler = handler.clone();
                    Box::pin(async move {
                        match handler.oneshot(req).await {
                            Ok(response) => Ok(response),
                            Err(never) => match never {},
                        }
                    })
                }
                None => {
                    error!(alias = %alias, "sysguard named handler missing");
                    Box::pin(async { Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response()) })
                }
            },
        }
    }
}
