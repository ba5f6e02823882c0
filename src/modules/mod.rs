pub mod backend;
pub mod library;
pub mod preferences;
pub mod serialize;
pub mod session;
pub mod tracking;
pub mod types;
pub mod view;
