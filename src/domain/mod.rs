pub mod error;
pub mod live;
pub mod model;
pub mod repository;
