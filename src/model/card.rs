use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub name: Option<String>,
}

/// A card as returned by the bulk `cards/all` listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub id_list: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub due_complete: bool,
    #[serde(default)]
    pub date_last_activity: Option<String>,
    #[serde(default)]
    pub closed: bool,
    pub id_short: u32,
    #[serde(default)]
    pub short_url: String,
}

/// A single card fetched with its checklists, actions and attachments.
#[derive(Debug, Clone, Deserialize)]
pub struct CardDetail {
    #[serde(flatten)]
    pub card: CardSummary,
    #[serde(default)]
    pub checklists: Vec<Checklist>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pos: f64,
    #[serde(default)]
    pub check_items: Vec<CheckItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckItemState {
    Complete,
    Incomplete,
}

impl CheckItemState {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckItemState::Complete => "complete",
            CheckItemState::Incomplete => "incomplete",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pos: f64,
    pub state: CheckItemState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    CommentCard,
    UpdateCheckItemStateOnCard,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub date: String,
    #[serde(default)]
    pub data: ActionData,
    /// Kept as a raw map: the author field shown in documents is configurable.
    #[serde(default)]
    pub member_creator: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionData {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub check_item: Option<ActionCheckItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionCheckItem {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub date: Option<String>,
}
