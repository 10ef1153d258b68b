pub mod config;
pub mod error;
pub mod lalamove;
pub mod notify;
pub mod routes;
pub mod signature;
pub mod state;
pub mod worker;
