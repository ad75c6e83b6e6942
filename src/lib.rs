pub mod catalog;
pub mod config;
pub mod data_types;
pub mod frontend;
pub mod provider;
pub mod remote;
pub mod schema;
pub mod translate;

#[cfg(test)]
pub(crate) mod testutils;
