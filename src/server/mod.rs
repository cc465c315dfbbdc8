//! HTTP server layer for the gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           HTTP Layer                             │
//! │   POST /access/{document,video}     GET /media/{document,video}  │
//! │                                                                  │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────────┐  │
//! │  │ throttle │─▶│ handlers │─▶│responder │  │      routes      │  │
//! │  │(per group│  │(issue /  │  │(stream + │  │ (router config)  │  │
//! │  │ limits)  │  │ serve)   │  │ headers) │  │                  │  │
//! │  └──────────┘  └──────────┘  └──────────┘  └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod handlers;
pub mod responder;
pub mod routes;
pub mod throttle;

pub use auth::{admin_auth_middleware, bearer_token, cookie_value, AdminAuth, VIDEO_COOKIE};
pub use handlers::{
    content_updated_handler, entitlement_updated_handler, health_handler,
    issue_document_handler, issue_video_handler, serve_document_handler, serve_video_handler,
    AppState, ContentHints, ErrorResponse, HealthResponse, IssueRequest, IssueResponse,
};
pub use responder::{stream_object, Disposition, ResponseOptions};
pub use routes::{create_router, GatewayServices, RouterConfig};
pub use throttle::{client_identity, rate_limit_middleware, ThrottleState};
