//! Media rental backend with two stores: a normalized relational store that
//! is the system of record, and a denormalized JSON document store populated
//! by migration.
//!
//! - [`relational`]: schema, typed rows and write paths
//! - [`document`]: collections, filters, sequence counters and document writes
//! - [`migration`]: ordered relational to document migration
//! - [`rental_window`]: family shared media over either store
//! - [`reset`]: wipes either store
//! - [`routes`]: HTTP surface

pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod migration;
pub mod relational;
pub mod rental_window;
pub mod reset;
pub mod routes;
pub mod state;
