//! Inspiration wall client: capture notes, links, and images, browse the
//! public wall, and manage your own dashboard against a hosted backend.

pub mod account;
pub mod app;
pub mod backend;
pub mod card;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod model;
pub mod mutation;
pub mod retry;
pub mod session;
pub mod watchdog;
