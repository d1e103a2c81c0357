pub mod admin;
pub mod chat;
pub mod cities;
pub mod health;
pub mod model;
pub mod suggest;
pub mod trip;
