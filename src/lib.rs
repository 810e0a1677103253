pub mod core;
pub mod main_module;
pub mod social;
