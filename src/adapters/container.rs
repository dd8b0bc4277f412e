use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::domain::ports::Container;
use crate::utils::error::Result;

/// Shared in-memory container. Clones observe the same content.
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    content: Arc<RwLock<String>>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Container for MemoryContainer {
    fn content(&self) -> String {
        match self.content.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_content(&mut self, content: &str) -> Result<()> {
        let mut guard = match self.content.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = content.to_string();
        Ok(())
    }
}

/// Rewrites a file on every update, for overlays that watch a local file.
#[derive(Debug, Clone)]
pub struct FileContainer {
    path: PathBuf,
    current: String,
}

impl FileContainer {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            current: String::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Container for FileContainer {
    fn content(&self) -> String {
        self.current.clone()
    }

    fn set_content(&mut self, content: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(&self.path, content)?;
        tracing::debug!("Wrote {} bytes to {}", content.len(), self.path.display());
        self.current = content.to_string();
        Ok(())
    }
}

/// Prints each update to stdout.
#[derive(Debug, Clone, Default)]
pub struct TerminalContainer {
    current: String,
}

impl TerminalContainer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Container for TerminalContainer {
    fn content(&self) -> String {
        self.current.clone()
    }

    fn set_content(&mut self, content: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", content)?;
        stdout.flush()?;
        self.current = content.to_string();
        Ok(())
    }
}
