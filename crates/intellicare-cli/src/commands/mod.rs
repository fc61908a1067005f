pub mod chat;
pub mod generate;
