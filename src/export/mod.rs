pub mod attachments;
pub mod document;
pub mod layout;
pub mod transform;
pub mod workbook;

use anyhow::{bail, Context, Result};

use crate::config::ExportConfig;
use crate::model::board::Board;
use crate::providers::BoardSource;
use crate::util::dates::DateFormatter;
use attachments::download_attachments;
use document::{save_document, DocxTemplate};
use layout::{remove_if_exists, ExportLayout};
use transform::{CardTransformer, ListNames};
use workbook::{write_workbook, WorkbookSummary};

#[derive(Debug)]
pub struct ExportReport {
    pub board: String,
    pub workbook: WorkbookSummary,
    pub documents: usize,
    pub skipped_attachments: usize,
}

#[derive(Debug)]
pub enum ExportOutcome {
    Exported(ExportReport),
    NoCards { board: String },
}

/// Export one board: workbook first, then one document per card.
///
/// `choose_board` is only asked when there is more than one board; it gets
/// them sorted by name and returns an index into that slice.
pub async fn run<S, F>(source: &S, config: &ExportConfig, choose_board: F) -> Result<ExportOutcome>
where
    S: BoardSource + ?Sized,
    F: FnOnce(&[Board]) -> Result<usize>,
{
    let layout = ExportLayout::new(&config.export.directory);
    layout.ensure()?;
    let template = DocxTemplate::open(&config.template_path())?;
    let dates = DateFormatter::new(&config.dates);

    let mut boards = source.boards().await?;
    boards.sort_by(|a, b| a.name.cmp(&b.name));
    let board = match boards.len() {
        0 => bail!("No board found for this account"),
        1 => &boards[0],
        _ => {
            let index = choose_board(&boards)?;
            boards
                .get(index)
                .with_context(|| format!("Board {index} does not exist"))?
        }
    };
    tracing::info!(board = %board.name, id = %board.id, "board selected");

    let mut lists = source.lists(&board.id).await?;
    lists.sort_by(|a, b| a.pos.total_cmp(&b.pos));
    let list_names = ListNames::new(&lists);

    let cards = source.cards(&board.id).await?;
    if cards.is_empty() {
        return Ok(ExportOutcome::NoCards {
            board: board.name.clone(),
        });
    }

    let transformer = CardTransformer::new(&list_names, &dates, &config.labels.user_name);

    println!("Exporting board '{}'...", board.name);
    let rows = cards
        .iter()
        .map(|card| {
            transformer
                .sheet_row(card)
                .with_context(|| format!("Card #{} '{}'", card.id_short, card.name))
        })
        .collect::<Result<Vec<_>>>()?;
    let workbook_path = layout.workbook_path(&board.name);
    remove_if_exists(&workbook_path)?;
    let workbook = write_workbook(&workbook_path, &rows, &config.labels)
        .with_context(|| format!("Failed to write {}", workbook_path.display()))?;

    println!("Exporting cards...");
    let mut skipped_attachments = 0;
    for (i, summary) in cards.iter().enumerate() {
        let detail = source.card_detail(&summary.id).await?;
        println!(
            "[{}/{}] Card #{} '{}'",
            i + 1,
            cards.len(),
            detail.card.id_short,
            detail.card.name
        );

        let downloads = download_attachments(source, &detail, &layout).await?;
        skipped_attachments += downloads.skipped;

        let context = transformer
            .context(board, &detail, &downloads.saved)
            .with_context(|| format!("Card #{} '{}'", detail.card.id_short, detail.card.name))?;
        let bytes = template
            .render(&context)
            .with_context(|| format!("Failed to render card #{}", detail.card.id_short))?;

        let path = layout.document_path(&detail.card.name, detail.card.id_short, detail.card.closed);
        save_document(&path, &bytes)?;
    }

    Ok(ExportOutcome::Exported(ExportReport {
        board: board.name.clone(),
        workbook,
        documents: cards.len(),
        skipped_attachments,
    }))
}
