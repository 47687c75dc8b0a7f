// Library entrypoint for integration tests and internal reuse.
pub mod api;
pub mod auth;
pub mod config;
pub mod events;
pub mod reconcile;
pub mod runtime;
pub mod shutdown;
pub mod state;
pub mod storage;
