pub mod errors;
pub mod event;
pub mod resource;
pub mod session;
pub mod settings;
pub mod tab;
