pub mod privilege;
pub mod process;
pub mod registry;
