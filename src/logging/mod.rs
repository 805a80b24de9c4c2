//! Request logging.
//!
//! # Data Flow
//! ```text
//! DestinationRoute
//!     → RequestContext::on_before_request_sent
//!         → AdditionalLogger::log_before_request_sent
//!     → Transport::send
//!     → RequestContext::on_reply_received
//!         → RequestLogger::log          (result counters, metrics, trace event)
//!         → AdditionalLogger::log       (sampled request records)
//! ```
//!
//! # Design Decisions
//! - One primary logger per request context, created with it
//! - The additional logger is injected into the proxy once and shared
//! - Loggers see requests and replies through borrowed views so the trait
//!   stays object-safe
//! - Loggers never fail; nothing they do reaches the request path

pub mod additional;
pub mod logger;
pub mod logger_context;

pub use additional::{AdditionalLogger, NoopAdditionalLogger, SampledAdditionalLogger};
pub use logger::RequestLogger;
pub use logger_context::{
    ExtraDataCallback, ReplyView, RequestLoggerContext, RequestLoggerContextFlags, RequestView,
    RpcStatsContext,
};
