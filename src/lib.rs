pub mod ai;
pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod idgen;
pub mod messages;
pub mod metrics;
pub mod models;
pub mod schema;
pub mod state;
pub mod store;

#[cfg(test)]
pub mod test_support;

#[macro_use]
extern crate diesel;
