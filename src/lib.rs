pub mod app;
pub mod config;
pub mod error;
pub mod event;
pub mod fs;
pub mod handler;
pub mod host;
pub mod logging;
pub mod nav;
pub mod owner;
pub mod session;
pub mod sync;
pub mod util;
pub mod viewer;
