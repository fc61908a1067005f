pub mod agent;
pub mod capabilities;
pub mod envelope;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod relay;
