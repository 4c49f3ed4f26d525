use anyhow::Context;
use std::path::Path;

/// Synthetic entry at index 0; the model reserves class 0 for background.
pub const BACKGROUND_LABEL: &str = "__Background__";

/// Returned for class ids the label file does not cover.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Class index to label mapping, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabelTable {
    labels: Vec<String>,
}

impl ClassLabelTable {
    /// Load a newline-delimited label file and prepend the background entry.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read class labels from {}", path.display()))?;

        let table = Self::from_lines(&contents);
        tracing::info!(
            path = %path.display(),
            classes = table.len(),
            "Loaded class labels"
        );
        tracing::debug!(labels = ?table.labels, "Class label table");

        Ok(table)
    }

    pub fn from_lines(contents: &str) -> Self {
        let labels = std::iter::once(BACKGROUND_LABEL.to_string())
            .chain(contents.lines().map(|line| line.trim_end_matches('\r').to_string()))
            .collect();
        Self { labels }
    }

    pub fn get(&self, class_id: u32) -> &str {
        self.labels
            .get(class_id as usize)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }

    /// Number of entries including the background label.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
