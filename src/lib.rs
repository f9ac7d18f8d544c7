pub mod config;
pub mod debounce;
pub mod environment;
pub mod errors;
pub mod normalization;
pub mod participant;
pub mod response;
pub mod routes;
pub mod session;
pub mod shutdown;
pub mod store;
pub mod submission;
pub mod validation;
