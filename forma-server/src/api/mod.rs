//! HTTP API handlers for forma-server

pub mod analytics;
pub mod forms;
pub mod health;
pub mod responses;

pub use analytics::analytics_routes;
pub use forms::form_routes;
pub use health::health_routes;
pub use responses::response_routes;
