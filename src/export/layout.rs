use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::error::ExportError;
use crate::util::sanitize::{output_file_name, sanitize_filename};

/// Directories written by an export run.
#[derive(Debug, Clone)]
pub struct ExportLayout {
    pub root: PathBuf,
    pub cards: PathBuf,
    pub archived: PathBuf,
    pub attachments: PathBuf,
}

impl ExportLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            cards: root.join("cards"),
            archived: root.join("archived"),
            attachments: root.join("attachments"),
            root,
        }
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.root, &self.cards, &self.archived, &self.attachments] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn workbook_path(&self, board_name: &str) -> PathBuf {
        self.root.join(output_file_name(board_name, "board", "xlsx"))
    }

    /// Open cards go to `cards/`, archived ones to `archived/`.
    pub fn document_path(&self, title: &str, id_short: u32, closed: bool) -> PathBuf {
        let dir = if closed { &self.archived } else { &self.cards };
        dir.join(output_file_name(title, &format!("card-{id_short}"), "docx"))
    }

    pub fn attachment_file_name(id_short: u32, name: &str) -> String {
        sanitize_filename(&format!("{id_short}-{name}"))
    }

    pub fn attachment_path(&self, file_name: &str) -> PathBuf {
        self.attachments.join(file_name)
    }
}

/// Delete `path` so it can be written fresh.
pub fn remove_if_exists(path: &Path) -> Result<(), ExportError> {
    if path.exists() {
        std::fs::remove_file(path).map_err(|source| ExportError::Remove {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "removed previous export");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_creates_all_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ExportLayout::new(dir.path().join("exports"));
        layout.ensure().unwrap();
        assert!(layout.cards.is_dir());
        assert!(layout.archived.is_dir());
        assert!(layout.attachments.is_dir());
        // idempotent
        layout.ensure().unwrap();
    }

    #[test]
    fn closed_flag_picks_the_directory() {
        let layout = ExportLayout::new("exports");
        assert_eq!(
            layout.document_path("Fix login", 3, false),
            PathBuf::from("exports/cards/Fix-login.docx")
        );
        assert_eq!(
            layout.document_path("Fix login", 3, true),
            PathBuf::from("exports/archived/Fix-login.docx")
        );
        assert_eq!(
            layout.document_path("!!!", 3, false),
            PathBuf::from("exports/cards/card-3.docx")
        );
    }

    #[test]
    fn workbook_is_named_after_the_board() {
        let layout = ExportLayout::new("exports");
        assert_eq!(
            layout.workbook_path("Équipe / Roadmap 2024"),
            PathBuf::from("exports/Equipe-Roadmap-2024.xlsx")
        );
    }

    #[test]
    fn attachment_names_are_prefixed_with_short_id() {
        assert_eq!(
            ExportLayout::attachment_file_name(12, "Screen shot.png"),
            "12-Screen-shot.png"
        );
    }

    #[test]
    fn remove_if_exists_deletes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.xlsx");
        std::fs::write(&path, b"old").unwrap();
        remove_if_exists(&path).unwrap();
        assert!(!path.exists());
        remove_if_exists(&path).unwrap();
    }

    #[test]
    fn remove_if_exists_fails_on_directories() {
        let dir = tempfile::tempdir().unwrap();
        let err = remove_if_exists(dir.path()).unwrap_err();
        assert!(matches!(err, ExportError::Remove { .. }));
    }
}
