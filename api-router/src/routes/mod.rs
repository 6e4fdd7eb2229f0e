pub mod health;
pub mod stories;
