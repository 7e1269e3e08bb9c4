use anyhow::{Context, Result};

use super::layout::{remove_if_exists, ExportLayout};
use super::transform::SavedAttachment;
use crate::model::card::CardDetail;
use crate::providers::BoardSource;

/// Attachments written for one card, and how many could not be fetched.
#[derive(Debug, Default)]
pub struct DownloadResult {
    pub saved: Vec<SavedAttachment>,
    pub skipped: usize,
}

/// Download every attachment of `card`, one after the other.
///
/// A failed download only skips that attachment. Failing to replace an
/// existing file on disk is fatal.
pub async fn download_attachments<S: BoardSource + ?Sized>(
    source: &S,
    card: &CardDetail,
    layout: &ExportLayout,
) -> Result<DownloadResult> {
    let mut result = DownloadResult::default();

    for attachment in &card.attachments {
        let file_name = ExportLayout::attachment_file_name(card.card.id_short, &attachment.name);
        let path = layout.attachment_path(&file_name);
        remove_if_exists(&path)?;

        println!("  Downloading '{file_name}'");
        let bytes = match source.download(&attachment.url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                println!("  Cannot download '{file_name}'");
                tracing::warn!(card = card.card.id_short, file = %file_name, error = %format!("{e:#}"), "attachment skipped");
                result.skipped += 1;
                continue;
            }
        };

        std::fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        result.saved.push(SavedAttachment {
            file_name,
            date: attachment.date.clone(),
        });
    }

    Ok(result)
}
