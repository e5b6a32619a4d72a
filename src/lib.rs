//! # Photoshoot Telegram Bot
//!
//! Telegram front-end for an external AI photo-model service: collects a
//! user's photos, forwards training and generation requests to the
//! service's webhooks, and relays asynchronous completion notifications
//! back to the user.

pub mod api_client;
pub mod bot;
pub mod config;
pub mod db;
pub mod localization;
pub mod media_group;
pub mod notifications;
pub mod server;
pub mod state;
