// ABOUTME: Path algebra for remote paths.
// ABOUTME: Normalization, scoped-prefix handling, parent/name extraction, and shell quoting.

pub const SEPARATOR: char = '/';
pub const ROOT: &str = "/";

/// Transport-scoped prefix for paths on `host:port`.
pub fn scope(host: &str, port: u16) -> String {
    format!("sftp://{}:{}", host, port)
}

/// Remove the scoped prefix if `path` carries it.
pub fn strip_scope<'a>(path: &'a str, scope: &str) -> &'a str {
    match path.strip_prefix(scope) {
        Some("") => ROOT,
        Some(rest) if rest.starts_with(SEPARATOR) => rest,
        _ => path,
    }
}

/// Collapse `.`, `..`, and repeated separators into a single-rooted path.
///
/// `..` at the root stays at the root.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("{}{}", ROOT, segments.join("/"))
}

pub fn is_absolute(path: &str) -> bool {
    path.starts_with(SEPARATOR)
}

pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// Last segment of `path`; empty for the root.
pub fn name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    trimmed.rsplit(SEPARATOR).next().unwrap_or("")
}

/// Path with its last segment removed, or `None` when `path` has no separator.
pub fn parent(path: &str) -> Option<String> {
    if !path.contains(SEPARATOR) {
        return None;
    }
    let trimmed = if is_root(path) {
        path
    } else {
        path.trim_end_matches(SEPARATOR)
    };
    let name = name(trimmed);
    let rest = trimmed[..trimmed.len() - name.len()].trim_end_matches(SEPARATOR);
    if rest.is_empty() {
        Some(ROOT.to_string())
    } else {
        Some(rest.to_string())
    }
}

pub fn join(base: &str, child: &str) -> String {
    let child = child.trim_start_matches(SEPARATOR);
    if base.ends_with(SEPARATOR) {
        format!("{}{}", base, child)
    } else if base.is_empty() {
        child.to_string()
    } else {
        format!("{}{}{}", base, SEPARATOR, child)
    }
}

/// Quote a string for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
