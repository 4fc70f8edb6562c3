#![warn(clippy::pedantic)]

pub mod api_service;
pub mod backplane_config;
pub mod cli;
pub mod http_server;
mod kubernetes;
pub mod metrics;
pub mod otel;
pub mod proxy_server;

/*
 * ============================================================================
 * Error
 * ============================================================================
 */
#[derive(Debug)]
pub enum Error {
    Finalizer(Box<kube::runtime::finalizer::Error<Error>>),
    Kube(kube::Error),
    MissingObjectKey(&'static str),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/*
 * ============================================================================
 * Result
 * ============================================================================
 */
pub type Result<T, E = Error> = std::result::Result<T, E>;
