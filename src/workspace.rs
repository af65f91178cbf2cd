//! Local side of a jump: the target file the shell alias reads, the alias
//! itself, and removal of cloned checkouts.

use anyhow::{bail, Context, Result};
use path_clean::PathClean;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::config::Config;

/// Record `repo_path` as the directory the shell alias should `cd` into
pub fn write_target(target_file: &Path, repo_path: &Path) -> Result<()> {
    if let Some(parent) = target_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    std::fs::write(target_file, repo_path.to_string_lossy().as_bytes())
        .with_context(|| format!("Failed to write target file: {:?}", target_file))
}

/// Shell function that runs hermes and changes into the recorded target
pub fn generate_alias(config: &Config) -> String {
    let target = config.target_path();
    let target = target.to_string_lossy();

    format!(
        r#"function {name}() {{
	local HERMES_BIN=$(command -v hermes)
	"$HERMES_BIN" "$@"
	local EXIT_STATUS=$?
	if [ -f "{target}" ]; then
		cd "$(cat "{target}")" && rm "{target}"
	fi
	return $EXIT_STATUS
}}
"#,
        name = config.alias_name,
        target = target
    )
}

/// Local checkout path for a repository name, which must stay under `root`
pub fn checkout_path(root: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if name.is_empty() || escapes {
        bail!("Invalid repository name {:?}: must be relative to the repo root", name);
    }

    Ok(root.join(relative))
}

/// Delete a checkout and any parent directories left empty, stopping at `root`
pub fn remove_checkout(path: &Path, root: &Path) -> Result<()> {
    let path = path.clean();
    let root = root.clean();

    if path == root || !path.starts_with(&root) {
        bail!("Refusing to remove {:?}: not inside {:?}", path, root);
    }

    if path.exists() {
        std::fs::remove_dir_all(&path)
            .with_context(|| format!("Failed to remove {:?}", path))?;
    }

    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root {
            break;
        }
        let empty = std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !empty {
            break;
        }
        debug!("Pruning empty directory {}", dir.display());
        std::fs::remove_dir(dir).with_context(|| format!("Failed to remove {:?}", dir))?;
        current = dir.parent();
    }

    Ok(())
}
