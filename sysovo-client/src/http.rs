//! REST implementation of the board store.
//!
//! Talks to the dashboard API (`/api/boards`, `/api/lists`, `/api/cards`)
//! with a bearer token. The API wraps some payloads in an envelope named
//! after the resource (`{"lists": [...]}`, `{"card": {...}}`) and returns
//! others bare; both shapes are accepted. Ids go into the path as single
//! percent-encoded segments.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use sysovo_core::storage::{ApiError, BoardApi};
use sysovo_core::types::{Board, BoardList, Card, CardPatch, ListPatch, UserShort};

use crate::config::ClientConfig;

pub struct HttpBoardApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBoardApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| ApiError::Transport(format!("invalid API URL {}: {}", config.api_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Transport(format!(
                "invalid API URL {}: not a base URL",
                config.api_url
            )));
        }
        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// `<base>/api/<segments...>`, each segment encoded on its own.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    fn request(&self, method: Method, path: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        resource: &'static str,
        id: &str,
    ) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                ApiError::Unavailable(e.to_string())
            } else {
                ApiError::Transport(e.to_string())
            }
        })?;
        check_response(response, resource, id).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &[&str],
        envelope: &str,
        resource: &'static str,
        id: &str,
    ) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path), resource, id).await?;
        decode(response, envelope).await
    }

    async fn write<B, T>(
        &self,
        method: Method,
        path: &[&str],
        body: &B,
        envelope: &str,
        resource: &'static str,
        id: &str,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(method, path).json(body);
        let response = self.send(builder, resource, id).await?;
        decode(response, envelope).await
    }

    async fn delete(&self, path: &[&str], resource: &'static str, id: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, path), resource, id)
            .await
            .map(|_| ())
    }
}

/// Map a non-2xx response to an `ApiError`, preferring the server's
/// `message` field over the raw body.
async fn check_response(
    response: Response,
    resource: &'static str,
    id: &str,
) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body);
    log::debug!(
        target: "sysovo.http",
        "{} {} rejected with {}: {}",
        resource,
        id,
        status,
        message
    );
    match status.as_u16() {
        404 => Err(ApiError::not_found(resource, id)),
        502..=504 => Err(ApiError::Unavailable(message)),
        code => Err(ApiError::Status {
            status: code,
            message,
        }),
    }
}

fn extract_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response, envelope: &str) -> Result<T, ApiError> {
    let body: Value = response
        .json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))?;
    unwrap_envelope(body, envelope)
}

/// Accept either `{"<envelope>": payload}` or the bare payload.
fn unwrap_envelope<T: DeserializeOwned>(body: Value, envelope: &str) -> Result<T, ApiError> {
    let payload = match body {
        Value::Object(mut map) if map.contains_key(envelope) => {
            map.remove(envelope).unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(payload)
        .map_err(|e| ApiError::Decode(format!("{}: {}", envelope, e)))
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    async fn list_boards(&self) -> Result<Vec<Board>, ApiError> {
        self.get(&["boards"], "boards", "boards", "").await
    }

    async fn create_board(&self, name: &str, description: Option<&str>) -> Result<Board, ApiError> {
        let body = json!({
            "name": name,
            "description": description.unwrap_or_default(),
        });
        self.write(Method::POST, &["boards"], &body, "board", "board", name)
            .await
    }

    async fn delete_board(&self, board_id: &str) -> Result<(), ApiError> {
        self.delete(&["boards", board_id], "board", board_id)
            .await
    }

    async fn add_member(&self, board_id: &str, user_id: &str) -> Result<(), ApiError> {
        let body = json!({ "boardId": board_id, "userId": user_id });
        let builder = self
            .request(Method::POST, &["boards", "add-member"])
            .json(&body);
        self.send(builder, "board", board_id).await.map(|_| ())
    }

    async fn list_employees(&self) -> Result<Vec<UserShort>, ApiError> {
        self.get(&["auth", "employees"], "employees", "employees", "")
            .await
    }

    async fn list_lists(&self, board_id: &str) -> Result<Vec<BoardList>, ApiError> {
        self.get(&["lists", board_id], "lists", "board", board_id)
            .await
    }

    async fn create_list(&self, board_id: &str, title: &str) -> Result<BoardList, ApiError> {
        let body = json!({ "boardId": board_id, "title": title });
        self.write(Method::POST, &["lists"], &body, "list", "board", board_id)
            .await
    }

    async fn update_list(&self, list_id: &str, patch: &ListPatch) -> Result<BoardList, ApiError> {
        self.write(
            Method::PUT,
            &["lists", list_id],
            patch,
            "list",
            "list",
            list_id,
        )
        .await
    }

    async fn delete_list(&self, list_id: &str) -> Result<(), ApiError> {
        self.delete(&["lists", list_id], "list", list_id)
            .await
    }

    async fn list_cards(&self, list_id: &str) -> Result<Vec<Card>, ApiError> {
        self.get(&["cards", list_id], "cards", "list", list_id)
            .await
    }

    async fn create_card(&self, list_id: &str, title: &str) -> Result<Card, ApiError> {
        let body = json!({ "listId": list_id, "title": title });
        self.write(Method::POST, &["cards"], &body, "card", "list", list_id)
            .await
    }

    async fn update_card(&self, card_id: &str, patch: &CardPatch) -> Result<Card, ApiError> {
        self.write(
            Method::PUT,
            &["cards", card_id],
            patch,
            "card",
            "card",
            card_id,
        )
        .await
    }

    async fn delete_card(&self, card_id: &str) -> Result<(), ApiError> {
        self.delete(&["cards", card_id], "card", card_id)
            .await
    }
}
