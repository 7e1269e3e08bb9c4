pub mod trello;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::board::{Board, BoardList};
use crate::model::card::{CardDetail, CardSummary};

/// Where the exporter reads a board from.
///
/// The bulk card listing and the per-card detail are separate reads; nothing
/// fetched by one is reused by the other.
#[async_trait]
pub trait BoardSource: Send + Sync {
    async fn boards(&self) -> Result<Vec<Board>>;
    async fn lists(&self, board_id: &str) -> Result<Vec<BoardList>>;
    async fn cards(&self, board_id: &str) -> Result<Vec<CardSummary>>;
    async fn card_detail(&self, card_id: &str) -> Result<CardDetail>;
    /// Raw bytes of an attachment.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}
