pub mod collector;
pub mod events;
pub mod health;
pub mod hosts;
pub mod services;
pub mod stats;
