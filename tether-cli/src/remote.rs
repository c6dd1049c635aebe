//! Remote backends selected by `remote.url`.
//!
//! - `file://<path>`: a JSON snapshot loaded into a [`MemoryRemote`] and
//!   written back after a non-dry-run sync. Relative paths resolve against
//!   the project root.
//! - `http(s)://…`: [`HttpRemote`], a blocking REST client.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use tether_core::{Item, ProjectConfig, SyncKey};
use tether_sync::{MemoryRemote, RemoteError, RemoteService};

/// Environment variable holding the bearer token for HTTP remotes.
pub const ENV_TOKEN: &str = "TETHER_TOKEN";

/// The remote a command talks to.
pub enum Remote {
    Snapshot { path: PathBuf, store: MemoryRemote },
    Http(HttpRemote),
}

impl Remote {
    pub fn open(root: &Path, config: &ProjectConfig) -> Result<Self> {
        let url = config.remote_url()?;
        if let Some(path) = url.strip_prefix("file://") {
            let path = root.join(path);
            let store = MemoryRemote::load(&path)
                .with_context(|| format!("failed to load remote snapshot {}", path.display()))?;
            return Ok(Remote::Snapshot { path, store });
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            let token = std::env::var(ENV_TOKEN).ok().filter(|t| !t.is_empty());
            return Ok(Remote::Http(HttpRemote::new(
                url,
                token,
                config.remote.page_size,
            )));
        }
        anyhow::bail!("unsupported remote url '{url}'; expected file://, http:// or https://")
    }

    pub fn service(&mut self) -> &mut dyn RemoteService {
        match self {
            Remote::Snapshot { store, .. } => store,
            Remote::Http(http) => http,
        }
    }

    pub fn view(&self) -> &dyn RemoteService {
        match self {
            Remote::Snapshot { store, .. } => store,
            Remote::Http(http) => http,
        }
    }

    /// Write a snapshot remote back to disk. No-op for HTTP.
    pub fn persist(&self) -> Result<()> {
        if let Remote::Snapshot { path, store } = self {
            store
                .save(path)
                .with_context(|| format!("failed to save remote snapshot {}", path.display()))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HttpRemote
// ---------------------------------------------------------------------------

/// Blocking REST client.
///
/// ```text
/// GET    {base}/{collection}?limit=N[&cursor=C]  -> { "items": [...], "next": C|null }
/// GET    {base}/{collection}/item?key=K
/// POST   {base}/{collection}?key=K
/// PUT    {base}/{collection}/item?key=K
/// DELETE {base}/{collection}/item?key=K
/// ```
pub struct HttpRemote {
    agent: ureq::Agent,
    base: String,
    token: Option<String>,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    next: Option<String>,
}

impl HttpRemote {
    pub fn new(base: &str, token: Option<String>, page_size: usize) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            base: base.trim_end_matches('/').to_string(),
            token,
            page_size: page_size.max(1),
        }
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let request = self
            .agent
            .request(method, url)
            .set("Accept", "application/json");
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{collection}", self.base)
    }

    fn item_url(&self, collection: &str) -> String {
        format!("{}/{collection}/item", self.base)
    }
}

impl RemoteService for HttpRemote {
    fn list(&self, collection: &str) -> Result<Vec<Item>, RemoteError> {
        let url = self.collection_url(collection);
        let limit = self.page_size.to_string();
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut request = self.request("GET", &url).query("limit", &limit);
            if let Some(cursor) = cursor.as_deref() {
                request = request.query("cursor", cursor);
            }
            let page: Page = read_json(send(request.call(), collection, None)?)?;
            for value in page.items {
                items.push(decode_item(value)?);
            }
            match page.next.filter(|n| !n.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(items)
    }

    fn fetch(&self, collection: &str, key: &SyncKey) -> Result<Item, RemoteError> {
        let request = self
            .request("GET", &self.item_url(collection))
            .query("key", key.as_str());
        decode_item(read_json(send(request.call(), collection, Some(key))?)?)
    }

    fn create(&mut self, collection: &str, key: &SyncKey, item: &Item) -> Result<Item, RemoteError> {
        let request = self
            .request("POST", &self.collection_url(collection))
            .query("key", key.as_str());
        let response = send(request.send_json(encode_item(item)), collection, Some(key))?;
        decode_item(read_json(response)?)
    }

    fn update(&mut self, collection: &str, key: &SyncKey, item: &Item) -> Result<Item, RemoteError> {
        let request = self
            .request("PUT", &self.item_url(collection))
            .query("key", key.as_str());
        let response = send(request.send_json(encode_item(item)), collection, Some(key))?;
        decode_item(read_json(response)?)
    }

    fn remove(&mut self, collection: &str, key: &SyncKey) -> Result<(), RemoteError> {
        let request = self
            .request("DELETE", &self.item_url(collection))
            .query("key", key.as_str());
        send(request.call(), collection, Some(key))?;
        Ok(())
    }
}

/// Map a ureq outcome onto [`RemoteError`].
fn send(
    result: Result<ureq::Response, ureq::Error>,
    collection: &str,
    key: Option<&SyncKey>,
) -> Result<ureq::Response, RemoteError> {
    let key_text = || key.map(SyncKey::to_string).unwrap_or_default();
    match result {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(404, _)) => Err(RemoteError::NotFound {
            collection: collection.to_string(),
            key: key_text(),
        }),
        Err(ureq::Error::Status(409, _)) => Err(RemoteError::Conflict {
            collection: collection.to_string(),
            key: key_text(),
        }),
        Err(ureq::Error::Status(status, response)) => Err(RemoteError::Failure {
            status: Some(status),
            message: response
                .into_string()
                .unwrap_or_else(|_| "unreadable response body".to_string()),
        }),
        Err(ureq::Error::Transport(transport)) => Err(RemoteError::Failure {
            status: None,
            message: transport.to_string(),
        }),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(response: ureq::Response) -> Result<T, RemoteError> {
    response
        .into_json()
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

/// Flat remote object → [`Item`]. `id` and `updated_at` move out of the
/// field map into the item's metadata.
fn decode_item(value: Value) -> Result<Item, RemoteError> {
    let Value::Object(mut fields) = value else {
        return Err(RemoteError::Decode(format!("expected an object, got {value}")));
    };
    let remote_id = match fields.remove("id") {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };
    let updated_at = match fields.remove("updated_at") {
        Some(Value::String(stamp)) => Some(
            DateTime::parse_from_rfc3339(&stamp)
                .map_err(|e| RemoteError::Decode(format!("bad updated_at '{stamp}': {e}")))?
                .with_timezone(&Utc),
        ),
        _ => None,
    };
    Ok(Item {
        fields,
        local: None,
        remote_id,
        updated_at,
    })
}

fn encode_item(item: &Item) -> Value {
    Value::Object(item.fields.clone())
}
