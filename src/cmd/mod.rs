//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled   |
//! |-----------|--------------------|
//! | `init`    | `Init`             |
//! | `run`     | `Run`              |
//! | `resume`  | `Resume`           |
//! | `status`  | `Status`, `List`   |
//! | `config`  | `Config`           |

pub mod config;
pub mod init;
pub mod resume;
pub mod run;
pub mod status;

pub use config::cmd_config;
pub use init::cmd_init;
pub use resume::{ResumeDecision, ResumeOptions, cmd_resume};
pub use run::{RunOptions, cmd_run};
pub use status::{cmd_list, cmd_status};
