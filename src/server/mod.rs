pub mod app;
pub mod middleware;
pub mod routes;
pub mod state;
