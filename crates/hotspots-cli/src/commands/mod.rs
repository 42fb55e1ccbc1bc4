pub mod calculate;
pub mod extract;
pub mod select;
