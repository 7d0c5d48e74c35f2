pub mod agent;
pub mod bridge;
pub mod config;
pub mod errors;
pub mod models;
pub mod page;
pub mod prompt_template;
pub mod protocol;
pub mod providers;
pub mod reducer;
pub mod tools;
