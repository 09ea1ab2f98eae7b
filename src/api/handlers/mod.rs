pub mod fs;
pub mod health;
