pub mod artifacts;
pub mod catalog;
pub mod config;
pub mod context;
pub mod endpoints;
pub mod error;
pub mod io;
pub mod knn;
pub mod logging;

#[cfg(test)]
pub(crate) mod fixtures;
