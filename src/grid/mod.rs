pub mod connectors;
pub mod fold;
pub mod layout;
pub mod time_grid;
