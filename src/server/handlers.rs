pub mod blacklist;
pub mod health;
