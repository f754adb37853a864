pub mod board;
pub mod config_store;
pub mod prefs;
pub mod providers;
pub mod rewards;
pub mod store;
