//! Document compositor – drives a [`LayoutEngine`] over a resolved source.
//!
//! Each call gets its own scratch copy of the source and its own engine. The
//! engine is shut down and the scratch file removed on every exit path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;

use crate::config::{ForgeConfig, MetricFonts, PageSetup};
use crate::engine::{LayoutEngine, NativeEngine};
use crate::error::{ForgeError, Result, Stage};
use crate::renderer::ResolvedSource;

/// A finished PDF. The caller owns the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    bytes: Vec<u8>,
    pages: usize,
}

impl RenderedDocument {
    pub const MIME_TYPE: &'static str = "application/pdf";

    pub fn new(bytes: Vec<u8>, pages: usize) -> Self {
        Self { bytes, pages }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, &self.bytes)
    }
}

/// Shuts the engine down when dropped.
struct EngineGuard<E: LayoutEngine> {
    engine: E,
}

impl<E: LayoutEngine> Drop for EngineGuard<E> {
    fn drop(&mut self) {
        self.engine.shutdown();
    }
}

#[derive(Debug, Clone)]
pub struct Compositor {
    page: PageSetup,
    fonts: MetricFonts,
    scratch_dir: Option<PathBuf>,
    load_timeout: Duration,
    title: String,
}

impl Compositor {
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self {
            page: config.page.clone(),
            fonts: config.fonts.clone(),
            scratch_dir: config.scratch_dir.clone(),
            load_timeout: config.load_timeout,
            title: config.title.clone(),
        }
    }

    pub fn page(&self) -> &PageSetup {
        &self.page
    }

    /// A fresh engine for one composition.
    pub fn native_engine(&self) -> NativeEngine {
        NativeEngine::new(self.page.clone(), self.fonts.clone(), self.title.clone())
    }

    /// Compose with the in-process engine.
    pub fn compose(&self, source: &ResolvedSource) -> Result<RenderedDocument> {
        self.compose_with(|| self.native_engine(), source)
    }

    /// Compose with the engine `make_engine` returns.
    pub fn compose_with<E, F>(&self, make_engine: F, source: &ResolvedSource) -> Result<RenderedDocument>
    where
        E: LayoutEngine,
        F: FnOnce() -> E,
    {
        let scratch = self.write_scratch(source)?;
        log::debug!("Wrote resolved source to {}", scratch.path().display());

        let mut guard = EngineGuard {
            engine: make_engine(),
        };
        let result = guard
            .engine
            .start()
            .and_then(|()| guard.engine.load_source(scratch.path(), self.load_timeout))
            .and_then(|()| guard.engine.capture());
        drop(guard);

        let path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            log::warn!("Could not remove scratch file {}: {e}", path.display());
        } else {
            log::debug!("Removed scratch file {}", path.display());
        }

        let document = result?;
        log::info!(
            "Composed {} page(s), {} bytes",
            document.page_count(),
            document.len()
        );
        Ok(document)
    }

    fn write_scratch(&self, source: &ResolvedSource) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("rx-forge-").suffix(".html");
        let created = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut file = created.map_err(|e| ForgeError::composition(Stage::Scratch, e.to_string()))?;
        file.write_all(source.as_str().as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| ForgeError::composition(Stage::Scratch, e.to_string()))?;
        Ok(file)
    }
}
