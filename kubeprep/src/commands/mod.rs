pub mod list_steps;
pub mod provision;
