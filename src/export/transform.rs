//! Turns Trello card payloads into workbook rows and document contexts.
//!
//! Rows carry raw text for the spreadsheet. Contexts carry text escaped for
//! the docx XML; escaping happens here and nowhere else.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::ExportError;
use crate::model::board::{Board, BoardList};
use crate::model::card::{Action, ActionKind, CardDetail, CardSummary, CheckItemState, Label};
use crate::util::dates::{self, DateFormatter, DateStyle};
use crate::util::sanitize::escape_xml;

/// List id → list name.
#[derive(Debug, Clone, Default)]
pub struct ListNames(HashMap<String, String>);

impl ListNames {
    /// Lists are kept in position order by the caller; lookup ignores order.
    pub fn new(lists: &[BoardList]) -> Self {
        Self(
            lists
                .iter()
                .map(|l| (l.id.clone(), l.name.clone()))
                .collect(),
        )
    }

    pub fn name(&self, list_id: Option<&str>) -> &str {
        list_id
            .and_then(|id| self.0.get(id))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// One spreadsheet line, unescaped.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub list_name: String,
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub due_date: String,
    pub last_activity_date: String,
    pub labels: String,
    pub short_id: u32,
    pub short_url: String,
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardContext {
    pub board: String,
    pub board_description: String,
    pub title: String,
    pub list: String,
    pub labels: String,
    pub start_date: String,
    pub due_date: String,
    pub due_complete: bool,
    pub last_activity_date: String,
    pub description: String,
    pub short_id: u32,
    pub url: String,
    pub closed: bool,
    pub checklists: Vec<ChecklistContext>,
    pub actions: Vec<CommentContext>,
    pub attachments: Vec<AttachmentContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistContext {
    pub name: String,
    /// `"<n>%"`, empty for a checklist without items.
    pub completion: String,
    pub items: Vec<CheckItemContext>,
    #[serde(skip)]
    pos: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckItemContext {
    pub name: String,
    pub state: &'static str,
    pub complete: bool,
    /// Date of the latest state change, empty when never toggled.
    pub date: String,
    #[serde(skip)]
    pos: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentContext {
    pub date: String,
    pub author: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentContext {
    pub file_name: String,
    pub date: String,
}

/// An attachment written to disk, before its date is formatted.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedAttachment {
    pub file_name: String,
    pub date: Option<String>,
}

pub struct CardTransformer<'a> {
    lists: &'a ListNames,
    dates: &'a DateFormatter,
    author_field: &'a str,
}

impl<'a> CardTransformer<'a> {
    pub fn new(lists: &'a ListNames, dates: &'a DateFormatter, author_field: &'a str) -> Self {
        Self {
            lists,
            dates,
            author_field,
        }
    }

    pub fn sheet_row(&self, card: &CardSummary) -> Result<SheetRow, ExportError> {
        Ok(SheetRow {
            list_name: self.lists.name(card.id_list.as_deref()).to_string(),
            title: card.name.clone(),
            description: card.desc.clone(),
            start_date: self.dates.format_opt(card.start.as_deref(), DateStyle::Date)?,
            due_date: self.dates.format_opt(card.due.as_deref(), DateStyle::DateTime)?,
            last_activity_date: self
                .dates
                .format_opt(card.date_last_activity.as_deref(), DateStyle::DateTime)?,
            labels: join_labels(&card.labels),
            short_id: card.id_short,
            short_url: card.short_url.clone(),
            closed: card.closed,
        })
    }

    pub fn context(
        &self,
        board: &Board,
        detail: &CardDetail,
        attachments: &[SavedAttachment],
    ) -> Result<CardContext, ExportError> {
        let card = &detail.card;
        Ok(CardContext {
            board: escape_xml(&board.name),
            board_description: escape_xml(&board.desc),
            title: escape_xml(&card.name),
            list: escape_xml(self.lists.name(card.id_list.as_deref())),
            labels: escape_xml(&join_labels(&card.labels)),
            start_date: self.dates.format_opt(card.start.as_deref(), DateStyle::Date)?,
            due_date: self.dates.format_opt(card.due.as_deref(), DateStyle::DateTime)?,
            due_complete: card.due_complete,
            last_activity_date: self
                .dates
                .format_opt(card.date_last_activity.as_deref(), DateStyle::DateTime)?,
            description: escape_xml(&card.desc),
            short_id: card.id_short,
            url: escape_xml(&card.short_url),
            closed: card.closed,
            checklists: self.checklists(detail)?,
            actions: self.comments(&detail.actions)?,
            attachments: attachments
                .iter()
                .map(|a| {
                    Ok(AttachmentContext {
                        file_name: escape_xml(&a.file_name),
                        date: self.dates.format_opt(a.date.as_deref(), DateStyle::Date)?,
                    })
                })
                .collect::<Result<_, ExportError>>()?,
        })
    }

    fn checklists(&self, detail: &CardDetail) -> Result<Vec<ChecklistContext>, ExportError> {
        let history = newest_first(&detail.actions);
        let mut checklists = Vec::new();

        for checklist in detail.checklists.iter().filter(|c| !c.name.is_empty()) {
            let mut items = Vec::with_capacity(checklist.check_items.len());
            for item in &checklist.check_items {
                let changed = last_state_change(&history, &item.id);
                items.push(CheckItemContext {
                    name: escape_xml(&item.name),
                    state: item.state.as_str(),
                    complete: item.state == CheckItemState::Complete,
                    date: self.dates.format_opt(changed, DateStyle::Date)?,
                    pos: item.pos,
                });
            }
            let completed = items.iter().filter(|i| i.complete).count();
            let completion = completion_percent(completed, items.len());
            items.sort_by(|a, b| a.pos.total_cmp(&b.pos));

            checklists.push(ChecklistContext {
                name: escape_xml(&checklist.name),
                completion,
                items,
                pos: checklist.pos,
            });
        }

        checklists.sort_by(|a, b| a.pos.total_cmp(&b.pos));
        Ok(checklists)
    }

    fn comments(&self, actions: &[Action]) -> Result<Vec<CommentContext>, ExportError> {
        actions
            .iter()
            .filter(|a| a.kind == ActionKind::CommentCard)
            .map(|a| -> Result<CommentContext, ExportError> {
                let author = a
                    .member_creator
                    .get(self.author_field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                Ok(CommentContext {
                    date: self.dates.format(&a.date, DateStyle::DateTime)?,
                    author: escape_xml(author),
                    text: escape_xml(a.data.text.as_deref().unwrap_or_default()),
                })
            })
            .collect()
    }
}

/// Non-empty label names joined with `", "`.
pub fn join_labels(labels: &[Label]) -> String {
    labels
        .iter()
        .filter_map(|l| l.name.as_deref())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `round(100 * completed / total)` with a `%` suffix, empty for no items.
/// Halves round to even.
pub fn completion_percent(completed: usize, total: usize) -> String {
    if total == 0 {
        return String::new();
    }
    let percent = (completed as f64 / total as f64 * 100.0).round_ties_even();
    format!("{percent:.0}%")
}

/// Actions ordered newest first; unparsable dates go last, ties keep source order.
fn newest_first(actions: &[Action]) -> Vec<&Action> {
    let mut ordered: Vec<&Action> = actions.iter().collect();
    ordered.sort_by(|a, b| dates::instant(&b.date).cmp(&dates::instant(&a.date)));
    ordered
}

fn last_state_change<'h>(history: &[&'h Action], check_item_id: &str) -> Option<&'h str> {
    history
        .iter()
        .copied()
        .find(|a| {
            a.kind == ActionKind::UpdateCheckItemStateOnCard
                && a.data
                    .check_item
                    .as_ref()
                    .is_some_and(|ci| ci.id == check_item_id)
        })
        .map(|a| a.date.as_str())
}
