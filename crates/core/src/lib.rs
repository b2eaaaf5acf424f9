//! Database-free domain logic for Tarantula test sets.
//!
//! Everything here is pure: scopes, ordering, case positions, priority
//! names, tag lists and CSV row rendering. Persistence lives in
//! `tarantula-db`.

pub mod csv_export;
pub mod error;
pub mod priority;
pub mod tagging;
pub mod test_set;
pub mod types;
