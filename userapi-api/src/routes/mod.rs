/// API route handlers
///
/// - `health`: Health check endpoint
/// - `services`: Service discovery endpoints

pub mod health;
pub mod services;
