//! sysguard-tower: host-pressure admission control for tower/axum servers.
//!
//! [`SysguardLayer`] wraps a whole [`axum::Router`]. For every request it
//! asks [`sysguard_core::Guard`] whether the host is under pressure and, if
//! so, reroutes the request to its configured fallback instead of letting it
//! reach the application.
//!
//! ```no_run
//! use axum::Router;
//! use axum::routing::{any, get};
//! use sysguard_core::Settings;
//! use sysguard_tower::SysguardLayer;
//! use tower::Layer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::parse(
//!     "sysguard on;\n\
//!      sysguard_load load=8 action=/overload;\n\
//!      sysguard_mem swapratio=40% action=@busy;\n",
//! )?;
//!
//! let router: Router = Router::new()
//!     .route("/", get(|| async { "hello" }))
//!     .route("/overload", get(|| async { "try again later" }));
//!
//! let guard = SysguardLayer::builder(settings)
//!     .named("@busy", any(|| async { "busy" }))
//!     .build()?;
//!
//! // Wrap the router itself, not individual routes, so internal redirects
//! // are routed again.
//! let app = guard.layer(router);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

mod error;
mod layer;
mod request;

pub use error::LayerError;
pub use layer::{SysguardLayer, SysguardLayerBuilder, SysguardService};
pub use request::Consulted;
