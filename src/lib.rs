pub mod aggregate;
pub mod clock;
pub mod config;
pub mod directions;
pub mod model;
pub mod recommend;
pub mod sampler;
pub mod scheduler;
pub mod store;
