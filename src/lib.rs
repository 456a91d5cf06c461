//! Terminal client for a community discussion forum: post feed, lazily
//! expanded comment trees, a paginated community directory, and a small
//! sweet-shop catalog served by the same backend.

pub mod api;
pub mod app;
pub mod catalog;
pub mod comments;
pub mod communities;
pub mod config;
pub mod feed;
pub mod session;
pub mod ui;
pub mod util;
