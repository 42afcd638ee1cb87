pub mod access_cache;
pub mod gateway;
pub mod handler;
pub mod registry;
pub mod rooms;
pub mod scheduler;
pub mod session;
