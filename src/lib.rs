//! Educora Billing - Subscription webhook reconciliation
//!
//! Receives signed payment-provider webhooks, keeps a local copy of each
//! user's subscription and invoices in sync with the provider, and answers
//! plan-permission queries from that copy.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
