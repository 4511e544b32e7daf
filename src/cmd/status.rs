//! Inspection commands: `bidforge status` and `bidforge list`.

use anyhow::{Context, Result};
use std::path::Path;
use uuid::Uuid;

use bidforge::checkpoint::{CheckpointStore, FileCheckpointStore};
use bidforge::init::{get_bidforge_dir, is_initialized};
use bidforge::ui::{render_listing, render_status};

fn store_for(project_dir: &Path) -> FileCheckpointStore {
    FileCheckpointStore::new(get_bidforge_dir(project_dir).join("checkpoints"))
}

pub async fn cmd_status(project_dir: &Path, workflow_id: Option<Uuid>) -> Result<()> {
    if !is_initialized(project_dir) {
        println!();
        println!("Project: Not initialized");
        println!();
        println!("Run 'bidforge init' to initialize the project.");
        println!();
        return Ok(());
    }

    let store = store_for(project_dir);
    let workflow_id = match workflow_id {
        Some(id) => id,
        None => {
            let latest = store.list().await.context("Failed to list workflows")?;
            match latest.first() {
                Some(info) => info.workflow_id,
                None => {
                    println!("No workflows found. Run 'bidforge run --rfp <file>' to start one.");
                    return Ok(());
                }
            }
        }
    };

    let state = store
        .load(workflow_id)
        .await
        .with_context(|| format!("Failed to load workflow {}", workflow_id))?;
    println!();
    print!("{}", render_status(&state));
    println!();
    Ok(())
}

pub async fn cmd_list(project_dir: &Path) -> Result<()> {
    let infos = store_for(project_dir)
        .list()
        .await
        .context("Failed to list workflows")?;
    print!("{}", render_listing(&infos));
    Ok(())
}
