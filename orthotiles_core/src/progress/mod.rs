//! Terminal progress reporting for the local job runner.

mod bar;

pub use bar::ProgressBar;
