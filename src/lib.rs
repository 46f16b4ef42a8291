pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod model;
pub mod storage;
pub mod util;
