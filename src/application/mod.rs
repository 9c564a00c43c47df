pub mod clock;
pub mod error;
pub mod service;
pub mod view_model;
