//! Configuration view and validation commands: `bidforge config`.

use anyhow::Result;

use super::super::ConfigCommands;

fn print_effective(toml: &bidforge::config::BidforgeToml) {
    println!("[defaults]");
    println!("  express_mode = {}", toml.defaults.express_mode);
    println!("  agent_timeout_secs = {}", toml.defaults.agent_timeout_secs);
    println!("  max_phase_retries = {}", toml.defaults.max_phase_retries);
    println!("  max_rejection_reruns = {}", toml.defaults.max_rejection_reruns);
    println!();
    println!("[gates]");
    println!("  weakness_threshold = {}", toml.gates.weakness_threshold);
    println!("  page_deviation_limit = {}", toml.gates.page_deviation_limit);
    println!("  traceability_floor = {}", toml.gates.traceability_floor);
    println!();
    println!("[quality]");
    println!("  pass_threshold = {}", toml.quality.pass_threshold);
    println!("  max_revision_rounds = {}", toml.quality.max_revision_rounds);
    println!("  fallback_score_step = {}", toml.quality.fallback_score_step);
    println!();
    println!("[artifacts]");
    println!("  research_tokens = {}", toml.artifacts.research_tokens);
    println!("  analysis_tokens = {}", toml.artifacts.analysis_tokens);
    println!("  plan_tokens = {}", toml.artifacts.plan_tokens);
    println!("  implement_tokens = {}", toml.artifacts.implement_tokens);
    println!();
    println!("[agent]");
    if let Some(cmd) = &toml.agent.claude_cmd {
        println!("  claude_cmd = \"{}\"", cmd);
    }
    println!("  model = \"{}\"", toml.agent.model);
    println!();
    println!("[lookup]");
    println!("  catalog = \"{}\"", toml.lookup.catalog);
    println!();
}

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use bidforge::config::{BidforgeConfig, BidforgeToml, CONFIG_FILE};
    use bidforge::init::get_bidforge_dir;

    let bidforge_dir = get_bidforge_dir(project_dir);
    let config_path = bidforge_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Bidforge Configuration");
            println!("======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();
                print_effective(&BidforgeToml::load(&config_path)?);

                println!("Effective values (with env overrides):");
                let config = BidforgeConfig::new(project_dir.to_path_buf())?;
                println!("  express_mode = {}", config.express_mode());
                println!("  agent_timeout = {}s", config.agent_timeout().as_secs());
                println!("  claude_cmd = \"{}\"", config.claude_cmd());
                println!();
            } else {
                println!("No bidforge.toml found at {}", config_path.display());
                println!();
                println!("Using default configuration:");
                println!();
                print_effective(&BidforgeToml::default());
                println!("Run 'bidforge config init' to create a bidforge.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No bidforge.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = BidforgeToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("bidforge.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !bidforge_dir.exists() {
                std::fs::create_dir_all(&bidforge_dir)?;
            }

            BidforgeToml::default().save(&config_path)?;

            println!("Created bidforge.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [gates] thresholds that decide when a human must look");
            println!("  - [quality] pass threshold and revision rounds");
            println!("  - [artifacts] token budgets per phase artifact");
            println!();
        }
    }

    Ok(())
}
