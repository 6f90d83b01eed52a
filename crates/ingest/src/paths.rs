use std::path::PathBuf;

/// Project log directories written by the CLI client. `CLAUDE_CONFIG_DIR` may
/// list several config dirs separated by commas.
pub fn default_log_roots() -> Vec<PathBuf> {
    if let Ok(value) = std::env::var("CLAUDE_CONFIG_DIR") {
        let roots: Vec<PathBuf> = value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| PathBuf::from(part).join("projects"))
            .collect();
        if !roots.is_empty() {
            return roots;
        }
    }
    let Some(home) = dirs::home_dir() else {
        return vec![PathBuf::from(".claude").join("projects")];
    };
    vec![
        home.join(".claude").join("projects"),
        home.join(".config").join("claude").join("projects"),
    ]
}
