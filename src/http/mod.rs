//! HTTP surface: router, health, leaderboard

pub mod routes;

pub use routes::build_router;
