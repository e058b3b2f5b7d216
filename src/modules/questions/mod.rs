pub mod controller;
pub mod model;
pub mod router;
pub mod rules;
pub mod service;
