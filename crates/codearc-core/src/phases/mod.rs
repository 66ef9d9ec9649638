//! Pipeline phases, run in order by `pipeline::run_pipeline`.

pub mod calls;
pub mod communities;
pub mod parsing;
pub mod scan;
