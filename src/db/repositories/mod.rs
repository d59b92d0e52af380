pub mod audit;
pub mod document;
pub mod user;
