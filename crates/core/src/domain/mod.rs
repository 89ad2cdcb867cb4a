pub mod compatibility;
pub mod outfit;
pub mod product;
pub mod user;
