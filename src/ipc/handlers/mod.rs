pub mod classes;
pub mod core;
pub mod members;
pub mod records;
pub mod reports;
pub mod setup;
pub mod taxonomy;
