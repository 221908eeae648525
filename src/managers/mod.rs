// Shell state managers
// Managers own mutable shell state: the tab list and the per-tab cookie snapshots.

pub mod session_store;
pub mod tab_registry;
