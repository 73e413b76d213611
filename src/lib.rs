//! Geofence danger alerts
//!
//! This library provides the core functionality for the geofence-alerts service:
//! checking reported positions against active danger zones through a Redis
//! read-through cache, and delivering webhook notifications for dangerous checks
//! through a durable, retrying Redis queue.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod shutdown;
