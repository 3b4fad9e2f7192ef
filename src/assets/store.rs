use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;

use crate::{
    assets::media::PreparedAudio,
    foundation::error::{PipelineError, PipelineResult},
};

#[derive(Clone, Debug)]
/// Decoded raster image in premultiplied RGBA8 form.
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Wrap an owned premultiplied buffer, checking its length against the dimensions.
    pub fn from_premul(width: u32, height: u32, rgba8_premul: Vec<u8>) -> PipelineResult<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::config("image dimensions must be non-zero"));
        }
        if rgba8_premul.len() != width as usize * height as usize * 4 {
            return Err(PipelineError::config(format!(
                "image buffer has {} bytes, expected {}x{}x4",
                rgba8_premul.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        })
    }

    /// Single-color image, mostly useful for fixtures and solid backgrounds.
    pub fn solid(width: u32, height: u32, premul: [u8; 4]) -> PipelineResult<Self> {
        let px = width as usize * height as usize;
        let mut data = Vec::with_capacity(px * 4);
        for _ in 0..px {
            data.extend_from_slice(&premul);
        }
        Self::from_premul(width, height, data)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Kind of resource behind an [`AssetHandle`].
pub enum AssetKind {
    /// Decoded image.
    Image,
    /// Decoded PCM audio.
    Audio,
    /// Scratch file on disk.
    File,
}

/// Payload handed to [`AssetStore::acquire`].
#[derive(Clone, Debug)]
pub enum AssetPayload {
    /// Decoded image kept in memory.
    Image(PreparedImage),
    /// Decoded audio kept in memory.
    Audio(PreparedAudio),
    /// Raw bytes spilled to a scratch file with the given extension.
    Bytes {
        /// File contents.
        bytes: Vec<u8>,
        /// Extension without the dot, e.g. `"wav"`.
        extension: String,
    },
}

impl AssetPayload {
    fn kind(&self) -> AssetKind {
        match self {
            Self::Image(_) => AssetKind::Image,
            Self::Audio(_) => AssetKind::Audio,
            Self::Bytes { .. } => AssetKind::File,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Opaque reference to a store-owned temporary resource.
///
/// Handles are plain values; the [`AssetStore`] remains the only owner of the resource.
pub struct AssetHandle {
    id: u64,
    kind: AssetKind,
}

impl AssetHandle {
    /// Resource kind.
    pub fn kind(self) -> AssetKind {
        self.kind
    }

    /// Raw numeric id, stable for the lifetime of the store.
    pub fn id(self) -> u64 {
        self.id
    }
}

impl std::fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.id)
    }
}

#[derive(Debug)]
enum Stored {
    Image(PreparedImage),
    Audio(PreparedAudio),
    File(PathBuf),
}

#[derive(Debug)]
struct Entry {
    label: String,
    stored: Stored,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    live: HashMap<u64, Entry>,
    acquired_total: u64,
    released_total: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Lifetime counters of an [`AssetStore`].
pub struct StoreStats {
    /// Handles currently live.
    pub live: usize,
    /// Handles ever acquired.
    pub acquired: u64,
    /// Handles ever released.
    pub released: u64,
}

/// Owner of every temporary resource of a render request.
///
/// `acquire`/`release` are safe to call from concurrent preprocessing tasks. Scratch files live
/// under a per-store directory, which is removed again by [`AssetStore::release_all`]. Nothing
/// else under the parent directory is touched.
#[derive(Debug)]
pub struct AssetStore {
    root: PathBuf,
    inner: Mutex<Inner>,
}

static STORE_SEQ: AtomicU64 = AtomicU64::new(0);

impl AssetStore {
    /// Open a store whose scratch files go under a fresh subdirectory of `parent`.
    ///
    /// Both directories are created up front so unavailable storage is reported before any
    /// stage runs. Teardown removes the subdirectory only; `parent` and its other contents stay.
    pub fn open(parent: impl Into<PathBuf>) -> PipelineResult<Self> {
        let parent = parent.into();
        create_root(&parent)?;
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let seq = STORE_SEQ.fetch_add(1, Ordering::Relaxed);
        let root = parent.join(format!("storyreel_{}_{nanos}_{seq}", std::process::id()));
        create_root(&root)?;
        Ok(Self {
            root,
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Open a store under the system temp dir.
    pub fn in_temp_dir() -> PipelineResult<Self> {
        Self::open(std::env::temp_dir())
    }

    /// Scratch directory owned by this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Take ownership of `payload` and return a handle to it.
    pub fn acquire(&self, label: &str, payload: AssetPayload) -> PipelineResult<AssetHandle> {
        let kind = payload.kind();
        let stored = match payload {
            AssetPayload::Image(img) => Stored::Image(img),
            AssetPayload::Audio(pcm) => Stored::Audio(pcm),
            AssetPayload::Bytes { bytes, extension } => {
                let (id, path) = self.reserve_path(&extension)?;
                std::fs::write(&path, &bytes).map_err(|e| {
                    PipelineError::storage(format!(
                        "failed to write scratch file '{}': {e}",
                        path.display()
                    ))
                })?;
                return Ok(self.insert(id, kind, label, Stored::File(path)));
            }
        };
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        drop(inner);
        Ok(self.insert(id, kind, label, stored))
    }

    /// Convenience wrapper for [`AssetPayload::Image`].
    pub fn acquire_image(&self, label: &str, img: PreparedImage) -> PipelineResult<AssetHandle> {
        self.acquire(label, AssetPayload::Image(img))
    }

    /// Convenience wrapper for [`AssetPayload::Audio`].
    pub fn acquire_audio(&self, label: &str, pcm: PreparedAudio) -> PipelineResult<AssetHandle> {
        self.acquire(label, AssetPayload::Audio(pcm))
    }

    /// Reserve an empty scratch file path for an external producer (e.g. a TTS command).
    ///
    /// The file itself is not created; whatever ends up at the path is removed on release.
    pub fn acquire_scratch_file(
        &self,
        label: &str,
        extension: &str,
    ) -> PipelineResult<(AssetHandle, PathBuf)> {
        let (id, path) = self.reserve_path(extension)?;
        let handle = self.insert(id, AssetKind::File, label, Stored::File(path.clone()));
        Ok((handle, path))
    }

    /// Release one handle. Releasing an unknown or already released handle is an error.
    pub fn release(&self, handle: AssetHandle) -> PipelineResult<()> {
        let entry = {
            let mut inner = self.inner.lock();
            let entry = inner.live.remove(&handle.id).ok_or_else(|| {
                PipelineError::storage(format!("release of unknown asset handle {handle}"))
            })?;
            inner.released_total += 1;
            entry
        };
        tracing::debug!(handle = %handle, label = %entry.label, "asset released");
        drop_entry(entry);
        Ok(())
    }

    /// Release every live handle and remove the store's own scratch directory. Returns how many
    /// were live.
    pub fn release_all(&self) -> usize {
        let entries: Vec<Entry> = {
            let mut inner = self.inner.lock();
            let drained: Vec<Entry> = inner.live.drain().map(|(_, e)| e).collect();
            inner.released_total += drained.len() as u64;
            drained
        };
        let n = entries.len();
        for entry in entries {
            drop_entry(entry);
        }
        if self.root.exists()
            && let Err(e) = std::fs::remove_dir_all(&self.root)
        {
            tracing::warn!(root = %self.root.display(), error = %e, "failed to remove scratch dir");
        }
        if n > 0 {
            tracing::debug!(released = n, "asset store torn down");
        }
        n
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// Lifetime counters.
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock();
        StoreStats {
            live: inner.live.len(),
            acquired: inner.acquired_total,
            released: inner.released_total,
        }
    }

    /// Whether `handle` still refers to a live resource.
    pub fn contains(&self, handle: AssetHandle) -> bool {
        self.inner.lock().live.contains_key(&handle.id)
    }

    /// Image behind `handle`, if it is live and an image.
    pub fn image(&self, handle: AssetHandle) -> Option<PreparedImage> {
        match &self.inner.lock().live.get(&handle.id)?.stored {
            Stored::Image(img) => Some(img.clone()),
            _ => None,
        }
    }

    /// Audio behind `handle`, if it is live and audio.
    pub fn audio(&self, handle: AssetHandle) -> Option<PreparedAudio> {
        match &self.inner.lock().live.get(&handle.id)?.stored {
            Stored::Audio(pcm) => Some(pcm.clone()),
            _ => None,
        }
    }

    /// Scratch file path behind `handle`, if it is live and file-backed.
    pub fn path(&self, handle: AssetHandle) -> Option<PathBuf> {
        match &self.inner.lock().live.get(&handle.id)?.stored {
            Stored::File(p) => Some(p.clone()),
            _ => None,
        }
    }

    fn reserve_path(&self, extension: &str) -> PipelineResult<(u64, PathBuf)> {
        create_root(&self.root)?;
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        let ext = extension.trim_start_matches('.');
        let name = if ext.is_empty() {
            format!("asset_{id:06}")
        } else {
            format!("asset_{id:06}.{ext}")
        };
        Ok((id, self.root.join(name)))
    }

    fn insert(&self, id: u64, kind: AssetKind, label: &str, stored: Stored) -> AssetHandle {
        let mut inner = self.inner.lock();
        inner.live.insert(
            id,
            Entry {
                label: label.to_string(),
                stored,
            },
        );
        inner.acquired_total += 1;
        let handle = AssetHandle { id, kind };
        tracing::debug!(handle = %handle, label, "asset acquired");
        handle
    }
}

impl Drop for AssetStore {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Scope guard that runs [`AssetStore::release_all`] on every exit path.
pub struct TeardownGuard<'a> {
    store: &'a AssetStore,
}

impl<'a> TeardownGuard<'a> {
    /// Guard `store` until the returned value is dropped.
    pub fn new(store: &'a AssetStore) -> Self {
        Self { store }
    }
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        let released = self.store.release_all();
        tracing::debug!(released, "teardown complete");
    }
}

/// Store-backed scratch files handed to an external producer for the duration of one call.
///
/// Every path comes from [`AssetStore::acquire_scratch_file`]; dropping the space releases the
/// handles it issued, and with them the files.
#[derive(Debug)]
pub struct ScratchSpace<'a> {
    store: &'a AssetStore,
    label: String,
    issued: Mutex<Vec<AssetHandle>>,
}

impl<'a> ScratchSpace<'a> {
    /// Scratch space on `store`; `label` tags every file it hands out.
    pub fn new(store: &'a AssetStore, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Reserve a fresh scratch file path with the given extension.
    pub fn file(&self, extension: &str) -> PipelineResult<PathBuf> {
        let (handle, path) = self.store.acquire_scratch_file(&self.label, extension)?;
        self.issued.lock().push(handle);
        Ok(path)
    }

    /// Handles issued so far.
    pub fn handles(&self) -> Vec<AssetHandle> {
        self.issued.lock().clone()
    }
}

impl Drop for ScratchSpace<'_> {
    fn drop(&mut self) {
        for handle in self.issued.get_mut().drain(..) {
            // A concurrent release_all may already have taken it.
            if let Err(e) = self.store.release(handle) {
                tracing::debug!(handle = %handle, error = %e, "scratch file already released");
            }
        }
    }
}

/// Store-owned still image plus its pixel dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageAsset {
    /// Handle of the decoded pixels.
    pub handle: AssetHandle,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageAsset {
    /// Acquire `img` into `store`.
    pub fn acquire(store: &AssetStore, label: &str, img: PreparedImage) -> PipelineResult<Self> {
        let (width, height) = (img.width, img.height);
        let handle = store.acquire_image(label, img)?;
        Ok(Self {
            handle,
            width,
            height,
        })
    }
}

/// Store-owned audio buffer plus its duration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioAsset {
    /// Handle of the decoded PCM.
    pub handle: AssetHandle,
    /// Duration in seconds.
    pub duration_sec: f64,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
}

impl AudioAsset {
    /// Acquire `pcm` into `store`.
    pub fn acquire(store: &AssetStore, label: &str, pcm: PreparedAudio) -> PipelineResult<Self> {
        let duration_sec = pcm.duration_sec();
        let (sample_rate, channels) = (pcm.sample_rate, pcm.channels);
        let handle = store.acquire_audio(label, pcm)?;
        Ok(Self {
            handle,
            duration_sec,
            sample_rate,
            channels,
        })
    }
}

fn create_root(root: &Path) -> PipelineResult<()> {
    std::fs::create_dir_all(root).map_err(|e| {
        PipelineError::storage(format!(
            "scratch directory '{}' is unavailable: {e}",
            root.display()
        ))
    })
}

fn drop_entry(entry: Entry) {
    if let Stored::File(path) = entry.stored
        && path.exists()
        && let Err(e) = std::fs::remove_file(&path)
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch file");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
