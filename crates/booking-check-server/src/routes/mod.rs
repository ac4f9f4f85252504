//! HTTP route handlers.

pub mod health;
pub mod ingress;
pub mod subscriptions;
