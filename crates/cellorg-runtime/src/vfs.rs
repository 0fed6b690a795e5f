//! VFS-rooted tool dispatcher (§4.3): every path is resolved relative to a
//! root and escape attempts are rejected before any I/O happens. Patch
//! operations are applied to an in-memory line buffer and only written back
//! if every operation in the batch succeeds (atomicity, §4.3/§8).

use async_trait::async_trait;
use cellorg_kernel::plan::{Action, PatchOp, PatchOpType};
use cellorg_kernel::vfs::{ActionOutput, ToolDispatcher, ToolError};
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 64 * 1024;
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

pub struct FileVfs {
    root: PathBuf,
    max_file_bytes: u64,
    output_limit_bytes: usize,
    command_timeout: Duration,
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Translates a small glob subset (`*`, `?`) to a regex anchored on the
/// whole relative path.
fn glob_to_regex(pattern: &str) -> regex::Regex {
    let mut out = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c if regex::escape(&c.to_string()) != c.to_string() => {
                out.push_str(&regex::escape(&c.to_string()))
            }
            c => out.push(c),
        }
    }
    out.push('$');
    regex::Regex::new(&out).unwrap_or_else(|_| regex::Regex::new("^$").unwrap())
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_path_buf());
        }
    }
    Ok(())
}

impl FileVfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Resolves `rel` against the root, rejecting any path that would
    /// escape it. Normalization is purely lexical so this also rejects
    /// escapes for paths that do not yet exist (e.g. `write_file` targets).
    fn resolve(&self, rel: &str) -> Result<PathBuf, ToolError> {
        let root_abs = self
            .root
            .canonicalize()
            .map_err(|e| ToolError::Io(e.to_string()))?;
        let candidate = normalize(&root_abs.join(rel));
        if !candidate.starts_with(&root_abs) {
            return Err(ToolError::PathEscape);
        }
        Ok(candidate)
    }

    fn do_search(&self, query: &str, pattern: &str) -> Result<ActionOutput, ToolError> {
        let root_abs = self
            .root
            .canonicalize()
            .map_err(|e| ToolError::Io(e.to_string()))?;
        let mut all = Vec::new();
        walk(&root_abs, &root_abs, &mut all).map_err(|e| ToolError::Io(e.to_string()))?;

        let matcher = glob_to_regex(if pattern.is_empty() { "*" } else { pattern });
        let mut matches: Vec<String> = all
            .into_iter()
            .filter(|rel| matcher.is_match(&rel.to_string_lossy()))
            .filter(|rel| {
                if query.is_empty() {
                    return true;
                }
                std::fs::read_to_string(root_abs.join(rel))
                    .map(|content| content.contains(query))
                    .unwrap_or(false)
            })
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .collect();
        matches.sort();
        Ok(ActionOutput::Paths(matches))
    }

    fn do_read_file(&self, path: &str) -> Result<ActionOutput, ToolError> {
        let resolved = self.resolve(path)?;
        let meta = std::fs::metadata(&resolved).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotFound(path.to_string())
            } else {
                ToolError::Io(e.to_string())
            }
        })?;
        if meta.len() > self.max_file_bytes {
            return Err(ToolError::TooLarge);
        }
        let content = std::fs::read_to_string(&resolved).map_err(|e| ToolError::Io(e.to_string()))?;
        Ok(ActionOutput::Text(content))
    }

    fn do_write_file(&self, path: &str, content: &str) -> Result<ActionOutput, ToolError> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ToolError::Io(e.to_string()))?;
        }
        std::fs::write(&resolved, content).map_err(|e| ToolError::Io(e.to_string()))?;
        Ok(ActionOutput::Confirmation(format!("wrote {} bytes to {}", content.len(), path)))
    }

    fn do_patch(&self, file: &str, operations: &[PatchOp]) -> Result<ActionOutput, ToolError> {
        let resolved = self.resolve(file)?;
        let original = std::fs::read_to_string(&resolved).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotFound(file.to_string())
            } else {
                ToolError::Io(e.to_string())
            }
        })?;
        let mut lines: Vec<String> = original.lines().map(str::to_string).collect();

        for op in operations {
            match op.op {
                PatchOpType::Insert => {
                    if op.line == 0 || op.line > lines.len() + 1 {
                        return Err(ToolError::OutOfRange(op.line));
                    }
                    lines.insert(op.line - 1, op.content.clone().unwrap_or_default());
                }
                PatchOpType::Replace => {
                    if op.line == 0 || op.line > lines.len() {
                        return Err(ToolError::OutOfRange(op.line));
                    }
                    lines[op.line - 1] = op.content.clone().unwrap_or_default();
                }
                PatchOpType::Delete => {
                    if op.line == 0 || op.line > lines.len() {
                        return Err(ToolError::OutOfRange(op.line));
                    }
                    lines.remove(op.line - 1);
                }
            }
        }

        let mut new_content = lines.join("\n");
        if original.ends_with('\n') {
            new_content.push('\n');
        }
        std::fs::write(&resolved, new_content).map_err(|e| ToolError::Io(e.to_string()))?;
        Ok(ActionOutput::PatchSummary(format!("applied {} operations to {}", operations.len(), file)))
    }

    async fn run(&self, command: &str) -> Result<ActionOutput, ToolError> {
        let root_abs = self
            .root
            .canonicalize()
            .map_err(|e| ToolError::Io(e.to_string()))?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&root_abs)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::Spawn(e.to_string()))?;

        let output = tokio::time::timeout(self.command_timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout)?
            .map_err(|e| ToolError::Spawn(e.to_string()))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        if combined.len() > self.output_limit_bytes {
            combined.truncate(self.output_limit_bytes);
        }

        let code = output.status.code();
        if output.status.success() {
            Ok(ActionOutput::CommandOutput { output: combined, exit_code: code })
        } else {
            Err(ToolError::NonZeroExit { code: code.unwrap_or(-1), output: combined })
        }
    }
}

#[async_trait]
impl ToolDispatcher for FileVfs {
    async fn dispatch(&self, action: &Action) -> Result<ActionOutput, ToolError> {
        match action {
            Action::Search { query, pattern } => self.do_search(query, pattern),
            Action::ReadFile { path } => self.do_read_file(path),
            Action::WriteFile { path, content } => self.do_write_file(path, content),
            Action::Patch { file, operations } => self.do_patch(file, operations),
            Action::RunCommand { command } => self.run(command).await,
            Action::RunTests { pattern } => self.run(&format!("cargo test {pattern}")).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellorg_kernel::plan::PatchOp;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_round_trips_byte_for_byte() {
        let dir = tempdir().unwrap();
        let vfs = FileVfs::new(dir.path());
        vfs.dispatch(&Action::WriteFile { path: "hello.txt".into(), content: "hi".into() })
            .await
            .unwrap();
        let out = vfs.dispatch(&Action::ReadFile { path: "hello.txt".into() }).await.unwrap();
        assert_eq!(out.as_text(), "hi");
    }

    #[tokio::test]
    async fn read_file_rejects_path_escape() {
        let dir = tempdir().unwrap();
        let vfs = FileVfs::new(dir.path());
        let err = vfs
            .dispatch(&Action::ReadFile { path: "../../etc/passwd".into() })
            .await
            .unwrap_err();
        assert_eq!(err.tag(), "path_escape");
    }

    #[tokio::test]
    async fn read_file_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let vfs = FileVfs::new(dir.path());
        let err = vfs.dispatch(&Action::ReadFile { path: "nope.txt".into() }).await.unwrap_err();
        assert_eq!(err.tag(), "not_found");
    }

    #[tokio::test]
    async fn patch_applies_insert_replace_delete_in_order() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "a\nb\nc").unwrap();
        let vfs = FileVfs::new(dir.path());
        vfs.dispatch(&Action::Patch {
            file: "f.txt".into(),
            operations: vec![
                PatchOp { op: cellorg_kernel::plan::PatchOpType::Replace, line: 2, content: Some("B".into()) },
                PatchOp { op: cellorg_kernel::plan::PatchOpType::Insert, line: 1, content: Some("z".into()) },
                PatchOp { op: cellorg_kernel::plan::PatchOpType::Delete, line: 4 },
            ],
        })
        .await
        .unwrap();
        let out = vfs.dispatch(&Action::ReadFile { path: "f.txt".into() }).await.unwrap();
        assert_eq!(out.as_text(), "z\na\nc");
    }

    #[tokio::test]
    async fn patch_is_atomic_on_out_of_range_operation() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "a\nb").unwrap();
        let vfs = FileVfs::new(dir.path());
        let err = vfs
            .dispatch(&Action::Patch {
                file: "f.txt".into(),
                operations: vec![
                    PatchOp { op: cellorg_kernel::plan::PatchOpType::Replace, line: 1, content: Some("A".into()) },
                    PatchOp { op: cellorg_kernel::plan::PatchOpType::Replace, line: 99, content: Some("X".into()) },
                ],
            })
            .await
            .unwrap_err();
        assert_eq!(err.tag(), "out_of_range");
        let out = vfs.dispatch(&Action::ReadFile { path: "f.txt".into() }).await.unwrap();
        assert_eq!(out.as_text(), "a\nb");
    }

    #[tokio::test]
    async fn search_matches_glob_pattern() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("b.txt"), "notes").unwrap();
        let vfs = FileVfs::new(dir.path());
        let out = vfs
            .dispatch(&Action::Search { query: String::new(), pattern: "*.rs".into() })
            .await
            .unwrap();
        assert_eq!(out, ActionOutput::Paths(vec!["a.rs".to_string()]));
    }

    #[tokio::test]
    async fn run_command_captures_non_zero_exit_output() {
        let dir = tempdir().unwrap();
        let vfs = FileVfs::new(dir.path());
        let err = vfs
            .dispatch(&Action::RunCommand { command: "echo boom && exit 3".into() })
            .await
            .unwrap_err();
        match err {
            ToolError::NonZeroExit { code, output } => {
                assert_eq!(code, 3);
                assert!(output.contains("boom"));
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }
}
