//! Secret reference resolver.
//!
//! The config file never holds a password in plain text. Instead it may
//! point at one:
//!
//! - `pass::path/in/store`: runs `pass show path/in/store`, returns first line
//! - `env::VAR_NAME`: reads `$VAR_NAME` from the environment

/// Resolves a secret reference.
///
/// # Errors
///
/// Fails when the reference has no known prefix, or when the referenced
/// secret cannot be read.
pub fn resolve(reference: &str) -> Result<String, String> {
    if let Some(path) = reference.strip_prefix("pass::") {
        resolve_pass(path)
    } else if let Some(var) = reference.strip_prefix("env::") {
        resolve_env(var)
    } else {
        Err("plain-text passwords are not allowed in the config file; use `pass::…` or `env::…`".to_string())
    }
}

/// Returns true when `value` is a reference [`resolve`] understands.
pub fn is_reference(value: &str) -> bool {
    value.starts_with("pass::") || value.starts_with("env::")
}

/// Runs `pass show <path>` and returns the first line of stdout.
fn resolve_pass(path: &str) -> Result<String, String> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| format!("failed to run `pass show {}`: {}", path, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "`pass show {}` failed (exit {}): {}",
            path,
            output.status,
            stderr.trim()
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .next()
        .map(|s| s.to_string())
        .ok_or_else(|| format!("`pass show {}` produced no output", path))
}

fn resolve_env(var: &str) -> Result<String, String> {
    std::env::var(var).map_err(|_| format!("environment variable `{}` is not set", var))
}
