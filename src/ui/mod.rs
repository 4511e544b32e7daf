pub mod icons;
pub mod progress;
pub mod report;

pub use progress::WorkflowUI;
pub use report::{render_listing, render_status};
