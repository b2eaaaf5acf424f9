//! Row models and DTOs, one module per table family.

pub mod case;
pub mod project;
pub mod test_area;
pub mod test_set;
pub mod user;
