//! Keeps track of time wasted during the day. Entries are stored in a local database, the
//! in-memory history of a session is reconciled with it in the background, and statistics are
//! computed per day.
//!

pub mod api;
pub mod cli;
pub mod service;
pub mod stats;
pub mod storage;
pub mod utils;
