use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use teamgraph::db::Database;

pub const WORKSPACE_DIR: &str = ".teamgraph";
pub const DATABASE_FILE: &str = "workspace.db";

pub fn run(path: &Path) -> Result<()> {
    let workspace_dir = path.join(WORKSPACE_DIR);

    if workspace_dir.exists() {
        println!("Already initialized at {}", path.display());
        return Ok(());
    }

    fs::create_dir_all(&workspace_dir).context("Failed to create .teamgraph directory")?;
    Database::open(&workspace_dir.join(DATABASE_FILE)).context("Failed to create workspace database")?;
    println!("Created {}", workspace_dir.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_fresh_init() {
        let dir = tempdir().unwrap();
        let result = run(dir.path());
        assert!(result.is_ok());

        assert!(dir.path().join(".teamgraph").exists());
        assert!(dir.path().join(".teamgraph/workspace.db").exists());
    }

    #[test]
    fn test_run_already_initialized() {
        let dir = tempdir().unwrap();
        run(dir.path()).unwrap();
        let result = run(dir.path());
        assert!(result.is_ok());
    }

    #[test]
    fn test_run_database_usable() {
        let dir = tempdir().unwrap();
        run(dir.path()).unwrap();

        let db = Database::open(&dir.path().join(".teamgraph/workspace.db")).unwrap();
        assert!(db.list_projects().unwrap().is_empty());
    }

    #[test]
    fn test_run_keeps_existing_data() {
        let dir = tempdir().unwrap();
        run(dir.path()).unwrap();
        {
            let db = Database::open(&dir.path().join(".teamgraph/workspace.db")).unwrap();
            db.create_project(&teamgraph::models::NewProject {
                name: "Launch".into(),
                ..Default::default()
            })
            .unwrap();
        }

        run(dir.path()).unwrap();
        let db = Database::open(&dir.path().join(".teamgraph/workspace.db")).unwrap();
        assert_eq!(db.list_projects().unwrap().len(), 1);
    }
}
