use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::Path};

/// Loads every `*.md` file in `prompts_path`, keyed by file stem.
pub fn load_prompts(prompts_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_only_markdown_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("persona.md"), "You are a friend.").unwrap();
        fs::write(dir.path().join("classify_intent.md"), "Classify.").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(dir.path().join("nested.md")).unwrap();

        let prompts = load_prompts(dir.path()).unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts["persona"], "You are a friend.");
        assert_eq!(prompts["classify_intent"], "Classify.");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_prompts(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("prompts directory"));
    }
}
