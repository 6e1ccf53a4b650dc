// ABOUTME: Normalized view over one post or video node from the site's JSON
// ABOUTME: Derives the media url and filename, and streams the media to disk on request

use log::{debug, info, warn};
use reqwest::blocking::{Client as HttpClient, ClientBuilder};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::{download_error, malformed, AppError};

/// Photo or video, with the statistics only videos carry
#[derive(Debug, Clone, PartialEq)]
pub enum MediaKind {
    Photo,
    Video {
        view_count: u64,
        play_count: u64,
        /// Seconds
        duration: f64,
    },
}

/// A single downloadable media item
#[derive(Debug, Clone)]
pub struct MediaRecord {
    id: String,
    kind: MediaKind,
    src: String,
    filename: String,
    http_client: Option<HttpClient>,
}

#[derive(Deserialize)]
struct RawMedia {
    id: String,
    #[serde(default)]
    is_video: bool,
    display_url: String,
    video_url: Option<String>,
    video_view_count: Option<u64>,
    video_play_count: Option<u64>,
    video_duration: Option<f64>,
}

impl MediaRecord {
    /// Build a record from a raw `node` fragment
    pub fn from_node(node: &Value) -> Result<Self, AppError> {
        let raw = RawMedia::deserialize(node).map_err(|e| malformed(format!("media node: {}", e)))?;

        let (kind, src) = if raw.is_video {
            let missing = |field: &str| malformed(format!("video {} has no {}", raw.id, field));
            let kind = MediaKind::Video {
                view_count: raw.video_view_count.ok_or_else(|| missing("video_view_count"))?,
                play_count: raw.video_play_count.ok_or_else(|| missing("video_play_count"))?,
                duration: raw.video_duration.ok_or_else(|| missing("video_duration"))?,
            };
            let src = raw.video_url.clone().ok_or_else(|| missing("video_url"))?;
            (kind, src)
        } else {
            (MediaKind::Photo, raw.display_url.clone())
        };

        Ok(Self {
            filename: filename_from_url(&src),
            id: raw.id,
            kind,
            src,
            http_client: None,
        })
    }

    /// Use this HTTP client (and its session cookies) for `download`
    pub fn with_http_client(mut self, http_client: HttpClient) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &MediaKind {
        &self.kind
    }

    pub fn is_video(&self) -> bool {
        matches!(self.kind, MediaKind::Video { .. })
    }

    /// Video url for videos, display url for photos
    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn video_view_count(&self) -> Option<u64> {
        match self.kind {
            MediaKind::Video { view_count, .. } => Some(view_count),
            MediaKind::Photo => None,
        }
    }

    pub fn video_play_count(&self) -> Option<u64> {
        match self.kind {
            MediaKind::Video { play_count, .. } => Some(play_count),
            MediaKind::Photo => None,
        }
    }

    pub fn video_duration(&self) -> Option<f64> {
        match self.kind {
            MediaKind::Video { duration, .. } => Some(duration),
            MediaKind::Photo => None,
        }
    }

    /// Stream the media into `destination/filename`, creating the directory
    /// if needed. A partially written file is left in place on failure.
    pub fn download(&self, destination: &Path) -> Result<PathBuf, AppError> {
        if self.filename.is_empty() {
            return Err(download_error(&self.src, "url has no file name"));
        }

        fs::create_dir_all(destination).map_err(|e| download_error(&self.src, e))?;

        let http_client = match &self.http_client {
            Some(client) => client.clone(),
            None => ClientBuilder::new()
                .build()
                .map_err(|e| download_error(&self.src, e))?,
        };

        debug!("Downloading media {} from {}", self.id, self.src);

        let mut response = http_client
            .get(&self.src)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                warn!("Failed to fetch media {}: {}", self.id, e);
                download_error(&self.src, e)
            })?;

        let path = destination.join(&self.filename);
        let file = File::create(&path).map_err(|e| download_error(&self.src, e))?;
        let mut writer = BufWriter::new(file);

        let bytes = response.copy_to(&mut writer).map_err(|e| {
            warn!("Failed to write {}: {}", path.display(), e);
            download_error(&self.src, e)
        })?;

        writer
            .into_inner()
            .map_err(|e| download_error(&self.src, e.error()))?;

        info!("Saved {} ({} bytes) to {}", self.id, bytes, path.display());
        Ok(path)
    }
}

/// Last path segment of `url` with any query string stripped
fn filename_from_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string(),
        Err(_) => url
            .split('?')
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or_default()
            .to_string(),
    }
}
