pub mod chat;
pub mod cities;
pub mod health;
pub mod suggestions;
pub mod trips;
