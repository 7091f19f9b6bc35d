//! Postgres implementation of the payment store.

pub mod db;
mod pg_impl;

pub use pg_impl::PgStore;
