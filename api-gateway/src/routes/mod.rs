pub mod health;
pub mod manufacturers;
pub mod mint;
pub mod verify;
