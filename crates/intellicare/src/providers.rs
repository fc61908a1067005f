pub mod base;
pub mod configs;
pub mod ollama;

#[cfg(test)]
pub mod mock;
