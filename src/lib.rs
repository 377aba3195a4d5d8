//! Storefront API Library
//!
//! Core functionality for the storefront backend: catalog, carts, orders
//! with payment-provider integration, reviews and customer accounts.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod notifications;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: events::EventSender,
    pub auth: Arc<auth::AuthService>,
    pub services: handlers::AppServices,
}
