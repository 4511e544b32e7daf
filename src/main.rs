use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

mod cmd;

#[derive(Parser)]
#[command(name = "bidforge")]
#[command(version, about = "Phased proposal-generation orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit console logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a .bidforge directory in the project
    Init,
    /// Start a new proposal workflow from an RFP
    Run {
        /// RFP text file
        #[arg(long)]
        rfp: PathBuf,

        /// Company profile file handed to every phase
        #[arg(long)]
        company: Option<PathBuf>,

        /// Auto-pass the conditional gates
        #[arg(long)]
        express: bool,

        /// Run without an agent; every phase takes its fallback path
        #[arg(long)]
        offline: bool,

        /// Per-attempt agent timeout in seconds
        #[arg(long)]
        agent_timeout: Option<u64>,

        /// Answer gates in this terminal instead of stopping
        #[arg(short, long)]
        interactive: bool,
    },
    /// Answer the gate a workflow is waiting on
    Resume {
        workflow_id: Uuid,

        /// Gate number (1-5)
        #[arg(long)]
        gate: u8,

        #[arg(long, conflicts_with = "reject")]
        approve: bool,

        #[arg(long)]
        reject: bool,

        /// Feedback for a rejection; the preceding phase runs again with it
        #[arg(long, requires = "reject")]
        feedback: Option<String>,

        /// Suspension ticket printed when the workflow parked
        #[arg(long)]
        ticket: Option<Uuid>,

        /// Decide in a prompt instead of with --approve/--reject
        #[arg(short, long)]
        interactive: bool,

        #[arg(long)]
        offline: bool,

        #[arg(long)]
        agent_timeout: Option<u64>,
    },
    /// Show a workflow (the most recent one when no id is given)
    Status { workflow_id: Option<Uuid> },
    /// List stored workflows
    List,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default bidforge.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let log_dir = bidforge::init::is_initialized(&project_dir)
        .then(|| bidforge::init::get_bidforge_dir(&project_dir).join("logs"));
    let _log_guard = bidforge::logging::init_tracing(cli.verbose, cli.log_json, log_dir.as_deref())?;

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Run {
            rfp,
            company,
            express,
            offline,
            agent_timeout,
            interactive,
        } => {
            let options = cmd::RunOptions {
                rfp: rfp.clone(),
                company: company.clone(),
                express: *express,
                offline: *offline,
                agent_timeout: *agent_timeout,
                interactive: *interactive,
            };
            cmd::cmd_run(&cli, &project_dir, options).await?;
        }
        Commands::Resume {
            workflow_id,
            gate,
            approve,
            reject,
            feedback,
            ticket,
            interactive,
            offline,
            agent_timeout,
        } => {
            let decision = if *interactive {
                cmd::ResumeDecision::Prompt
            } else if *approve {
                cmd::ResumeDecision::Approve
            } else if *reject {
                cmd::ResumeDecision::Reject(feedback.clone())
            } else {
                anyhow::bail!("Pass --approve, --reject or --interactive");
            };
            let options = cmd::ResumeOptions {
                workflow_id: *workflow_id,
                gate: *gate,
                ticket: *ticket,
                decision,
                offline: *offline,
                agent_timeout: *agent_timeout,
            };
            cmd::cmd_resume(&cli, &project_dir, options).await?;
        }
        Commands::Status { workflow_id } => cmd::cmd_status(&project_dir, *workflow_id).await?,
        Commands::List => cmd::cmd_list(&project_dir).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
