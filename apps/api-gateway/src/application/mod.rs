// Declare sub-modules within the application layer
pub mod middleware;
pub mod tenants;
pub mod users;
