use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, COOKIE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use stokt_report::{ReportParams, WallConfig};

pub const DEFAULT_BASE_URL: &str = "https://www.sostokt.com";
const APP_USER_AGENT: &str = "Stkt/5 CFNetwork/1408.0.4 Darwin/22.5.0";
const MANIFEST_FILE: &str = "download_manifest.json";

#[derive(Clone, Debug)]
pub struct Credentials {
    pub cookie: String,
    pub authorization: String,
}

#[derive(Debug, Deserialize)]
pub struct RoutePage {
    #[serde(default)]
    pub results: Vec<JsonValue>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadManifest {
    pub face_id: String,
    pub base_url: String,
    pub fetched_at: DateTime<Utc>,
    pub pages: usize,
    pub routes: usize,
}

pub struct FaceClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl FaceClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn get(&self, url: &str) -> Result<Response> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .header(COOKIE, &self.credentials.cookie)
            .header(AUTHORIZATION, &self.credentials.authorization)
            .header(USER_AGENT, APP_USER_AGENT)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("GET {url} returned status {status}");
        }
        Ok(response)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get(url)?
            .json()
            .with_context(|| format!("{url} did not return the expected JSON"))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn routes_url(&self, face_id: &str) -> String {
        format!(
            "{}/api/faces/{face_id}/latest-climbs/paginated?grade_from=V0&grade_to=%3F&ordering=most_recent&tags=&search=&exclude_mine=false&show_circuit_only=false",
            self.base_url
        )
    }

    pub fn fetch_routes(&self, face_id: &str) -> Result<(Vec<JsonValue>, usize)> {
        fetch_all_pages(&self.routes_url(face_id), |url| self.get_json(url))
    }

    pub fn fetch_wall_config(&self, face_id: &str) -> Result<JsonValue> {
        self.get_json(&format!("{}/api/faces/{face_id}/setup", self.base_url))
    }

    pub fn fetch_media(&self, name: &str) -> Result<Vec<u8>> {
        let url = format!("{}/media/{name}", self.base_url);
        let bytes = self
            .get(&url)?
            .bytes()
            .with_context(|| format!("failed to read body of {url}"))?;
        Ok(bytes.to_vec())
    }
}

/// Where a face's routes, wall configuration and photo come from.
pub trait FaceSource {
    fn base_url(&self) -> &str;
    fn fetch_routes(&self, face_id: &str) -> Result<(Vec<JsonValue>, usize)>;
    fn fetch_wall_config(&self, face_id: &str) -> Result<JsonValue>;
    fn fetch_media(&self, name: &str) -> Result<Vec<u8>>;
}

impl FaceSource for FaceClient {
    fn base_url(&self) -> &str {
        FaceClient::base_url(self)
    }

    fn fetch_routes(&self, face_id: &str) -> Result<(Vec<JsonValue>, usize)> {
        FaceClient::fetch_routes(self, face_id)
    }

    fn fetch_wall_config(&self, face_id: &str) -> Result<JsonValue> {
        FaceClient::fetch_wall_config(self, face_id)
    }

    fn fetch_media(&self, name: &str) -> Result<Vec<u8>> {
        FaceClient::fetch_media(self, name)
    }
}

/// Follow `next` links from `first_url`, concatenating every page's results.
pub fn fetch_all_pages<F>(first_url: &str, mut fetch: F) -> Result<(Vec<JsonValue>, usize)>
where
    F: FnMut(&str) -> Result<RoutePage>,
{
    let mut results = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(first_url.to_string());
    while let Some(url) = next.take() {
        if !visited.insert(url.clone()) {
            bail!("pagination loops back to {url}");
        }
        let page = fetch(&url)?;
        debug!("Page {}: {} routes", visited.len(), page.results.len());
        results.extend(page.results);
        next = page.next.filter(|n| !n.is_empty());
    }
    Ok((results, visited.len()))
}

/// Download routes, wall configuration and wall photo for one face into `data_dir`.
pub fn download_face(
    client: &impl FaceSource,
    face_id: &str,
    data_dir: &Path,
    params: &ReportParams,
) -> Result<DownloadManifest> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    info!("Downloading routes for face {face_id}");
    let (routes, pages) = client.fetch_routes(face_id)?;
    write_json(&data_dir.join(&params.routes_file), &routes, false)?;
    info!("Fetched {} routes over {pages} pages", routes.len());

    info!("Downloading wall data for face {face_id}");
    let wall_raw = client.fetch_wall_config(face_id)?;
    write_json(&data_dir.join(&params.wall_config_file), &wall_raw, false)?;

    let wall: WallConfig = serde_json::from_value(wall_raw)
        .context("wall configuration does not have the expected shape")?;
    let picture = wall
        .picture
        .ok_or_else(|| anyhow!("wall configuration has no picture"))?;

    info!("Downloading image for face {face_id}");
    let image = client.fetch_media(&picture.name)?;
    let image_path = data_dir.join(&params.wall_image_file);
    fs::write(&image_path, image)
        .with_context(|| format!("failed to write {}", image_path.display()))?;

    let manifest = DownloadManifest {
        face_id: face_id.to_string(),
        base_url: client.base_url().to_string(),
        fetched_at: Utc::now(),
        pages,
        routes: routes.len(),
    };
    write_json(&data_dir.join(MANIFEST_FILE), &manifest, true)?;
    Ok(manifest)
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}
