//! Backend-agnostic domain logic for focusboard: the task record, the
//! canonical collection, derived views, and configuration.

pub mod config;
pub mod list;
pub mod paths;
pub mod summary;
pub mod task;
pub mod views;
