use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::BoardSource;
use crate::config::{ProxyConfig, TrelloConfig};
use crate::error::ExportError;
use crate::model::board::{Board, BoardList};
use crate::model::card::{CardDetail, CardSummary};

const BOARD_FIELDS: &[&str] = &["id", "name", "desc"];
const LIST_FIELDS: &[&str] = &["id", "name", "pos"];
const CARD_FIELDS: &[&str] = &[
    "id",
    "name",
    "desc",
    "idList",
    "labels",
    "start",
    "due",
    "dueComplete",
    "dateLastActivity",
    "closed",
    "idShort",
    "shortUrl",
];
const CARD_DETAIL_FIELDS: &[&str] = &[
    "id",
    "closed",
    "dueComplete",
    "dateLastActivity",
    "desc",
    "due",
    "idList",
    "idShort",
    "labels",
    "name",
    "start",
    "shortUrl",
];
const CARD_DETAIL_ACTIONS: &str = "commentCard,updateCheckItemStateOnCard";

pub struct TrelloClient {
    base_url: String,
    api_key: String,
    token: String,
    actions_limit: String,
    client: reqwest::Client,
}

impl TrelloClient {
    pub fn new(config: &TrelloConfig, proxy: &ProxyConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if proxy.enabled {
            if !proxy.http.is_empty() {
                builder = builder.proxy(
                    reqwest::Proxy::http(&proxy.http)
                        .with_context(|| format!("Invalid http proxy '{}'", proxy.http))?,
                );
            }
            if !proxy.https.is_empty() {
                builder = builder.proxy(
                    reqwest::Proxy::https(&proxy.https)
                        .with_context(|| format!("Invalid https proxy '{}'", proxy.https))?,
                );
            }
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            token: config.api_token.clone(),
            actions_limit: config.actions_limit.to_string(),
            client,
        })
    }

    fn auth_params(&self) -> [(&str, &str); 2] {
        [("key", self.api_key.as_str()), ("token", self.token.as_str())]
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Attachment downloads authenticate with an OAuth header instead of query parameters.
    fn attachment_auth(&self) -> String {
        format!(
            "OAuth oauth_consumer_key=\"{}\", oauth_token=\"{}\"",
            self.api_key, self.token
        )
    }

    /// GET `endpoint` with the credentials, a `fields` selection and any extra
    /// query parameters. Anything but a 200 with a decodable body is an error.
    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        fields: &[&str],
        extra: &[(&str, &str)],
    ) -> Result<T, ExportError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!(%endpoint, "GET");

        let resp = self
            .client
            .get(&url)
            .headers(Self::json_headers())
            .query(&self.auth_params())
            .query(&[("fields", fields.join(","))])
            .query(extra)
            .send()
            .await
            .map_err(|source| ExportError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ExportError::Status {
                endpoint: endpoint.to_string(),
                status,
            });
        }

        resp.json().await.map_err(|source| ExportError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

#[async_trait]
impl BoardSource for TrelloClient {
    async fn boards(&self) -> Result<Vec<Board>> {
        let boards = self
            .fetch("members/me/boards", BOARD_FIELDS, &[])
            .await
            .context("Cannot retrieve boards that you are member of")?;
        Ok(boards)
    }

    async fn lists(&self, board_id: &str) -> Result<Vec<BoardList>> {
        let lists = self
            .fetch(&format!("boards/{board_id}/lists"), LIST_FIELDS, &[])
            .await
            .context("Cannot retrieve the lists of the board")?;
        Ok(lists)
    }

    async fn cards(&self, board_id: &str) -> Result<Vec<CardSummary>> {
        let cards = self
            .fetch(&format!("boards/{board_id}/cards/all"), CARD_FIELDS, &[])
            .await
            .context("Cannot retrieve the cards of the board")?;
        Ok(cards)
    }

    async fn card_detail(&self, card_id: &str) -> Result<CardDetail> {
        let card = self
            .fetch(
                &format!("cards/{card_id}"),
                CARD_DETAIL_FIELDS,
                &[
                    ("actions", CARD_DETAIL_ACTIONS),
                    ("actions_limit", self.actions_limit.as_str()),
                    ("attachments", "true"),
                    ("checklists", "all"),
                ],
            )
            .await
            .with_context(|| format!("Cannot retrieve card {card_id}"))?;
        Ok(card)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.attachment_auth())
            .send()
            .await
            .map_err(|source| ExportError::Transport {
                endpoint: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ExportError::Status {
                endpoint: url.to_string(),
                status,
            }
            .into());
        }

        let bytes = resp.bytes().await.map_err(|source| ExportError::Decode {
            endpoint: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, header_regex, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TrelloClient {
        let config = TrelloConfig {
            api_url: format!("{}/1/", server.uri()),
            api_key: "k3y".into(),
            api_token: "t0ken".into(),
            actions_limit: 1000,
        };
        TrelloClient::new(&config, &ProxyConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn boards_sends_credentials_fields_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1/members/me/boards"))
            .and(query_param("key", "k3y"))
            .and(query_param("token", "t0ken"))
            .and(query_param("fields", "id,name,desc"))
            .and(header("cache-control", "no-cache"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "b1", "name": "Roadmap", "desc": "Q3"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let boards = client_for(&server).boards().await.unwrap();
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].name, "Roadmap");
        assert_eq!(boards[0].desc, "Q3");
    }

    #[tokio::test]
    async fn card_detail_requests_nested_collections() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1/cards/c1"))
            .and(query_param("actions", "commentCard,updateCheckItemStateOnCard"))
            .and(query_param("actions_limit", "1000"))
            .and(query_param("attachments", "true"))
            .and(query_param("checklists", "all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "c1", "name": "Card", "idShort": 4, "closed": false,
                "checklists": [], "actions": [], "attachments": []
            })))
            .mount(&server)
            .await;

        let card = client_for(&server).card_detail("c1").await.unwrap();
        assert_eq!(card.card.id_short, 4);
    }

    #[tokio::test]
    async fn non_200_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1/boards/b1/lists"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server).lists("b1").await.unwrap_err();
        let status = err
            .chain()
            .find_map(|e| e.downcast_ref::<ExportError>())
            .unwrap();
        assert!(matches!(
            status,
            ExportError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED
        ));
    }

    #[tokio::test]
    async fn undecodable_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1/boards/b1/cards/all"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        assert!(client_for(&server).cards("b1").await.is_err());
    }

    #[tokio::test]
    async fn download_uses_oauth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/plan.pdf"))
            .and(header_regex("authorization", r#"^OAuth oauth_consumer_key="k3y""#))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
            .mount(&server)
            .await;

        let bytes = client_for(&server)
            .download(&format!("{}/files/plan.pdf", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"%PDF");
    }

    #[tokio::test]
    async fn attachment_auth_carries_key_and_token() {
        let server = MockServer::start().await;
        assert_eq!(
            client_for(&server).attachment_auth(),
            "OAuth oauth_consumer_key=\"k3y\", oauth_token=\"t0ken\""
        );
    }

    #[tokio::test]
    async fn failed_download_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .download(&format!("{}/files/gone.png", server.uri()))
            .await;
        assert!(result.is_err());
    }
}
