//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept a pool, an executor, or a `&mut PgConnection` (for steps that
//! run inside a caller's transaction) as the first argument.

pub mod case_repo;
pub mod project_repo;
pub mod tag_repo;
pub mod test_area_repo;
pub mod test_set_repo;
pub mod user_repo;

pub use case_repo::CaseRepo;
pub use project_repo::ProjectRepo;
pub use tag_repo::TagRepo;
pub use test_area_repo::TestAreaRepo;
pub use test_set_repo::TestSetRepo;
pub use user_repo::UserRepo;
