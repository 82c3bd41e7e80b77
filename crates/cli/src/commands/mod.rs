pub mod agent;
pub mod models;
pub mod onboard;
