//! JSON REST API for Caissa.
//!
//! Exposes two axum [`Router`]s backed by any
//! [`caissa_core::store::AnalyticsStore`]: a user router scoped by the
//! `x-caissa-owner` header, and an admin router the server binary wraps in
//! operator authentication. TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! Router::new()
//!   .merge(caissa_api::user_router(store.clone()))
//!   .nest("/admin", caissa_api::admin_router(store))
//! ```

pub mod admin;
pub mod aggregates;
pub mod error;
pub mod games;
pub mod identity;
pub mod interactions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use caissa_core::store::AnalyticsStore;

pub use error::ApiError;
pub use identity::{OWNER_HEADER, Owner};

/// Build the owner-scoped user router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn user_router<S>(store: Arc<S>) -> Router<()>
where
  S: AnalyticsStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/games", get(games::list::<S>).post(games::ingest::<S>))
    .route("/aggregates/{kind}", get(aggregates::get_one::<S>))
    .route("/interactions", post(interactions::create::<S>))
    .route("/debug-sessions", post(interactions::opt_in_debug::<S>))
    .route("/flags/{name}", get(interactions::get_flag::<S>))
    .with_state(store)
}

/// Build the operator router for `store`. Callers must layer authentication
/// on top; nothing here checks credentials.
pub fn admin_router<S>(store: Arc<S>) -> Router<()>
where
  S: AnalyticsStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/interactions/{id}/flags", get(admin::interaction_flags::<S>))
    .route("/kpis/daily", get(admin::daily::<S>))
    .route("/cohorts/failure-modes", get(admin::cohorts::<S>))
    .route("/flags/{name}", put(admin::set_flag::<S>))
    .route(
      "/gold-cases",
      get(admin::list_gold_cases::<S>).post(admin::create_gold_case::<S>),
    )
    .route("/benchmark", post(admin::run_benchmark::<S>))
    .route("/privacy/{owner}/anonymize", post(admin::anonymize::<S>))
    .route("/privacy/{owner}/delete", post(admin::delete_all::<S>))
    .with_state(store)
}
