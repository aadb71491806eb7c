use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::session_parser::SessionParser;

/// Byte cursor into a session log that only ever hands out complete lines
#[derive(Debug, Clone)]
pub struct SessionTail {
    path: PathBuf,
    offset: u64,
}

impl SessionTail {
    pub fn new(path: PathBuf) -> Self {
        Self { path, offset: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Complete lines appended since the last read.
    ///
    /// Bytes after the final newline stay unread until the writer finishes the
    /// line. A file that shrank below the cursor is read again from the start.
    pub fn read_new_lines(&mut self) -> Result<Vec<String>> {
        let file_size = std::fs::metadata(&self.path)
            .with_context(|| format!("Failed to stat {}", self.path.display()))?
            .len();

        if file_size < self.offset {
            tracing::info!(
                path = %self.path.display(),
                offset = self.offset,
                file_size,
                "session file truncated, rewinding"
            );
            self.offset = 0;
        }
        if file_size == self.offset {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.seek(SeekFrom::Start(self.offset))?;

        let mut buf = Vec::with_capacity((file_size - self.offset) as usize);
        file.take(file_size - self.offset).read_to_end(&mut buf)?;

        let Some(last_newline) = buf.iter().rposition(|&b| b == b'\n') else {
            return Ok(Vec::new());
        };
        let consumed = &buf[..=last_newline];
        self.offset += consumed.len() as u64;

        Ok(String::from_utf8_lossy(consumed)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Feed newly appended lines to `parser`, returning how many were read
    pub fn poll(&mut self, parser: &mut SessionParser) -> Result<usize> {
        let lines = self.read_new_lines()?;
        parser.process_lines(&lines);
        Ok(lines.len())
    }
}

/// Replay a whole session file into `parser`, leaving a tail positioned at its end
pub fn replay_file(path: &Path, parser: &mut SessionParser) -> Result<SessionTail> {
    let mut tail = SessionTail::new(path.to_path_buf());
    let count = tail.poll(parser)?;
    tracing::debug!(path = %path.display(), lines = count, "replayed session file");
    Ok(tail)
}
