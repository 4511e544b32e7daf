//! Project initialization: `bidforge init`.

use anyhow::Result;

pub fn cmd_init(project_dir: &std::path::Path) -> Result<()> {
    use bidforge::init::{init_project, is_initialized};

    let was_initialized = is_initialized(project_dir);

    let result = init_project(project_dir)?;

    if result.created {
        println!(
            "Initialized bidforge project at {}",
            result.bidforge_dir.display()
        );
        println!();
        println!("Created directory structure:");
        println!("  .bidforge/");
        println!("  ├── bidforge.toml   # Gate, quality and budget settings");
        println!("  ├── catalog.json    # Past proposals, references and personnel");
        println!("  ├── checkpoints/    # One checkpoint per workflow");
        println!("  └── logs/           # bidforge.log");
        println!();
        println!("Next steps:");
        println!("  1. Fill catalog.json with past work and staff");
        println!("  2. Run `bidforge run --rfp <file>` to start a proposal");
    } else if was_initialized {
        println!(
            "Bidforge project already initialized at {}",
            result.bidforge_dir.display()
        );
        println!("Directory structure verified.");
    }

    Ok(())
}
