pub mod chat;
pub mod errors;
pub mod events;
pub mod gate;
pub mod models;
pub mod pipeline;
pub mod records;
pub mod tools;
