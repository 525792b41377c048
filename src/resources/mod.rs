//! Asset loading.
//!
//! A [`Loader`] runs a queue of [`File`]s with an optional cap on parallel
//! fetches. Fetching is async and touches nothing but the network or disk;
//! turning the bytes into resources happens back on the loader, one file at
//! a time, with mutable access to the [`TextureManager`].

use std::collections::VecDeque;

use futures::{FutureExt, StreamExt, future::LocalBoxFuture, stream::FuturesUnordered};
use log::{debug, warn};

use crate::{
    data_structures::texture::Texture, error::NginError, events::EventEmitter,
    resources::texture::TextureManager,
};

pub mod texture;

/// A loadable asset.
pub trait File {
    fn key(&self) -> &str;

    /// Fetches the raw bytes. `base_url` and `path` come from the loader and
    /// already end in `/` when set.
    fn fetch(&self, base_url: &str, path: &str) -> LocalBoxFuture<'static, anyhow::Result<Vec<u8>>>;

    /// Turns fetched bytes into resources.
    fn process(&mut self, data: Vec<u8>, textures: &mut TextureManager) -> anyhow::Result<()>;
}

/// Resolves the URL of a file.
///
/// Without a `url` the key plus `extension` is used. Absolute URLs (`blob:`,
/// `data:`, `http://`, `https://`, `//`) are returned as they are, anything
/// else is prefixed with `base_url` and `path`.
pub fn get_url(key: &str, url: Option<&str>, extension: &str, base_url: &str, path: &str) -> String {
    let url = match url {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => format!("{key}{extension}"),
    };
    const ABSOLUTE: [&str; 5] = ["blob:", "data:", "http://", "https://", "//"];
    if ABSOLUTE.iter().any(|prefix| url.starts_with(prefix)) {
        url
    } else {
        format!("{base_url}{path}{url}")
    }
}

/// Reads `url` over HTTP on wasm32, or as a file path natively.
pub async fn load_binary(url: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = reqwest::get(url).await?.error_for_status()?.bytes().await?.to_vec();
    #[cfg(not(target_arch = "wasm32"))]
    let data = tokio::fs::read(url).await?;
    Ok(data)
}

/// An image decoded with the `image` crate and stored as a texture.
pub struct ImageFile {
    key: String,
    url: Option<String>,
}

impl ImageFile {
    pub fn new(key: &str, url: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            url: url.map(str::to_string),
        }
    }
}

impl File for ImageFile {
    fn key(&self) -> &str {
        &self.key
    }

    fn fetch(&self, base_url: &str, path: &str) -> LocalBoxFuture<'static, anyhow::Result<Vec<u8>>> {
        let url = get_url(&self.key, self.url.as_deref(), ".png", base_url, path);
        async move { load_binary(&url).await }.boxed_local()
    }

    fn process(&mut self, data: Vec<u8>, textures: &mut TextureManager) -> anyhow::Result<()> {
        if textures.has(&self.key) {
            debug!("texture '{}' already exists, skipping", self.key);
            return Ok(());
        }
        let image = image::load_from_memory(&data)
            .map_err(|err| NginError::load(&self.key, err))?
            .to_rgba8();
        textures.add(&self.key, Texture::from_image(image));
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoaderEvent {
    Start,
    Progress,
    FileComplete,
    FileError,
    Complete,
}

/// Payload of every [`LoaderEvent`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoaderUpdate {
    /// The file the event is about, if any.
    pub key: Option<String>,
    pub progress: f32,
    pub completed: usize,
    pub queued: usize,
}

type Inflight = LocalBoxFuture<'static, (Box<dyn File>, anyhow::Result<Vec<u8>>)>;

pub struct Loader {
    base_url: String,
    path: String,
    /// Negative means unlimited; `0` behaves like `1`.
    max_parallel_downloads: i32,
    is_loading: bool,
    queue: VecDeque<Box<dyn File>>,
    inflight: usize,
    completed: Vec<String>,
    failed: Vec<String>,
    progress: f32,
    pub events: EventEmitter<LoaderEvent, LoaderUpdate>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    pub fn new() -> Self {
        Self {
            base_url: String::new(),
            path: String::new(),
            max_parallel_downloads: -1,
            is_loading: false,
            queue: VecDeque::new(),
            inflight: 0,
            completed: Vec::new(),
            failed: Vec::new(),
            progress: 0.0,
            events: EventEmitter::new(),
        }
    }

    /// Clears the queue and all bookkeeping. Listeners stay.
    pub fn reset(&mut self) {
        self.is_loading = false;
        self.queue.clear();
        self.inflight = 0;
        self.completed.clear();
        self.failed.clear();
        self.progress = 0.0;
    }

    pub fn add(&mut self, file: Box<dyn File>) -> &mut Self {
        self.queue.push_back(file);
        self
    }

    /// Removes a file that has not started loading yet.
    pub fn cancel(&mut self, key: &str) -> bool {
        let before = self.queue.len();
        self.queue.retain(|file| file.key() != key);
        self.queue.len() != before
    }

    pub fn set_base_url(&mut self, url: &str) -> &mut Self {
        self.base_url = with_trailing_slash(url);
        self
    }

    pub fn set_path(&mut self, path: &str) -> &mut Self {
        self.path = with_trailing_slash(path);
        self
    }

    pub fn set_max_parallel_downloads(&mut self, max: i32) -> &mut Self {
        self.max_parallel_downloads = max;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn total_files_to_load(&self) -> usize {
        self.queue.len() + self.inflight
    }

    /// Keys of the files that failed during the last run.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    /// Loads everything queued and resolves once the queue and the
    /// in-flight set are both empty. Returns the keys that completed, failed
    /// ones included. A run that is already in progress yields nothing.
    pub async fn start(&mut self, textures: &mut TextureManager) -> Option<Vec<String>> {
        if self.is_loading {
            return None;
        }
        self.completed.clear();
        self.failed.clear();
        self.progress = 0.0;
        if self.queue.is_empty() {
            self.progress = 1.0;
            self.emit(LoaderEvent::Complete, None);
            return Some(Vec::new());
        }
        self.is_loading = true;
        self.emit(LoaderEvent::Start, None);

        let mut inflight: FuturesUnordered<Inflight> = FuturesUnordered::new();
        self.next_files(&mut inflight);
        while let Some((mut file, fetched)) = inflight.next().await {
            self.inflight -= 1;
            let key = file.key().to_string();
            match fetched.and_then(|data| file.process(data, textures)) {
                Ok(()) => self.emit(LoaderEvent::FileComplete, Some(&key)),
                Err(err) => {
                    warn!("failed to load '{key}': {err:#}");
                    self.failed.push(key.clone());
                    self.emit(LoaderEvent::FileError, Some(&key));
                }
            }
            self.completed.push(key);
            self.update_progress();
            self.next_files(&mut inflight);
        }

        self.is_loading = false;
        self.emit(LoaderEvent::Complete, None);
        Some(std::mem::take(&mut self.completed))
    }

    fn next_files(&mut self, inflight: &mut FuturesUnordered<Inflight>) {
        let mut limit = self.queue.len();
        if self.max_parallel_downloads >= 0 {
            let max = (self.max_parallel_downloads as usize).max(1);
            limit = limit.min(max).saturating_sub(self.inflight);
        }
        for _ in 0..limit {
            let Some(file) = self.queue.pop_front() else {
                break;
            };
            let fetch = file.fetch(&self.base_url, &self.path);
            self.inflight += 1;
            inflight.push(async move { (file, fetch.await) }.boxed_local());
        }
    }

    fn update_progress(&mut self) {
        let completed = self.completed.len();
        let queued = self.total_files_to_load();
        if completed > 0 {
            self.progress = completed as f32 / (completed + queued) as f32;
        }
        self.emit(LoaderEvent::Progress, None);
    }

    fn emit(&mut self, event: LoaderEvent, key: Option<&str>) {
        let update = LoaderUpdate {
            key: key.map(str::to_string),
            progress: self.progress,
            completed: self.completed.len(),
            queued: self.total_files_to_load(),
        };
        self.events.emit(&event, &update);
    }
}

fn with_trailing_slash(value: &str) -> String {
    if value.is_empty() || value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    }
}
