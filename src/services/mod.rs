// Shell services
// Services provide configuration, host-facing seams (cookie jar, notifier, probe) and the resource governor.

pub mod config_service;
pub mod cookie_jar;
pub mod notifier;
pub mod resource_governor;
pub mod resource_probe;
