pub mod backup;
pub mod catalog;
pub mod core;
pub mod lists;
pub mod nodes;
pub mod progress;
