//! External editor integration for composing comments and editing config.

use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opens an external editor on `initial_text` and returns the saved text.
///
/// Returns `None` when the saved text is blank.
///
/// Editor priority:
/// 1) `$VISUAL`
/// 2) `$EDITOR`
/// 3) `nvim`
/// 4) `vim`
/// 5) `vi`
pub fn compose_with_system_editor(initial_text: &str) -> Result<Option<String>> {
    let path = temp_file_path();
    fs::write(&path, initial_text)
        .with_context(|| format!("failed to write {}", path.display()))?;

    let output = run_editor(&path).and_then(|()| {
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
    });
    let _ = fs::remove_file(&path);

    let text = output?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_owned()))
}

/// Opens a file path in the user's preferred editor.
pub fn edit_file_with_system_editor(path: &Path) -> Result<()> {
    run_editor(path)
}

fn editor_candidates() -> Vec<String> {
    let mut candidates = Vec::new();
    for variable in ["VISUAL", "EDITOR"] {
        if let Some(value) = env::var_os(variable) {
            let value = value.to_string_lossy().trim().to_owned();
            if !value.is_empty() {
                candidates.push(value);
            }
        }
    }
    candidates.extend(["nvim".to_owned(), "vim".to_owned(), "vi".to_owned()]);
    candidates
}

fn run_editor(path: &Path) -> Result<()> {
    for command in editor_candidates() {
        // `EDITOR="code --wait"` style values carry their own arguments.
        let Some(mut parts) = shlex::split(&command) else {
            continue;
        };
        if parts.is_empty() {
            continue;
        }
        let program = parts.remove(0);

        match Command::new(&program).args(&parts).arg(path).status() {
            Ok(status) if status.success() => return Ok(()),
            Ok(status) => {
                return Err(anyhow!(
                    "editor `{}` exited with status {}",
                    command,
                    status
                        .code()
                        .map(|code| code.to_string())
                        .unwrap_or_else(|| "unknown".to_owned())
                ));
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(anyhow!("failed to launch editor `{}`: {}", command, err));
            }
        }
    }

    Err(anyhow!(
        "no editor found (tried $VISUAL, $EDITOR, nvim, vim, vi)"
    ))
}

fn temp_file_path() -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0);

    env::temp_dir().join(format!(
        "threadline-comment-{}-{}.txt",
        std::process::id(),
        millis
    ))
}
