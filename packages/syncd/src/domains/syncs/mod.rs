// Sync definitions, their job logs, and the concrete sync handlers

pub mod handlers;
pub mod models;
