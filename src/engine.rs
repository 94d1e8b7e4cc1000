//! Layout engines – the capability the compositor drives.
//!
//! An engine is started, handed a source file, captured once and shut down.
//! [`NativeEngine`] is the in-process backend: markup parsing, style
//! resolution, flex layout, pagination and PDF writing.

use std::fs;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::compositor::RenderedDocument;
use crate::config::{MetricFonts, PageSetup};
use crate::error::{ForgeError, Result, Stage};
use crate::fonts::FontBook;
use crate::layout::compute_layout;
use crate::markup;
use crate::page_plan::PagePlan;
use crate::pagination::paginate;
use crate::pdf::write_pdf;
use crate::resources::{self, ResourceSet};
use crate::style::build_styled_tree;

pub trait LayoutEngine {
    /// Bring the engine up. Fails when its configuration is unusable.
    fn start(&mut self) -> Result<()>;

    /// Load the source at `path` and every resource it embeds, waiting at
    /// most `timeout` for the resources.
    fn load_source(&mut self, path: &Path, timeout: Duration) -> Result<()>;

    /// Print the loaded source.
    fn capture(&mut self) -> Result<RenderedDocument>;

    /// Release everything the engine holds. Safe to call more than once.
    fn shutdown(&mut self);
}

struct Loaded {
    plan: PagePlan,
    resources: ResourceSet,
}

/// In-process engine built on Taffy and printpdf.
pub struct NativeEngine {
    page: PageSetup,
    metric_fonts: MetricFonts,
    title: String,
    fonts: Option<FontBook>,
    loaded: Option<Loaded>,
}

impl NativeEngine {
    pub fn new(page: PageSetup, metric_fonts: MetricFonts, title: impl Into<String>) -> Self {
        Self {
            page,
            metric_fonts,
            title: title.into(),
            fonts: None,
            loaded: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.fonts.is_some()
    }

    /// The page plan of the loaded source.
    pub fn page_plan(&self) -> Option<&PagePlan> {
        self.loaded.as_ref().map(|l| &l.plan)
    }
}

impl LayoutEngine for NativeEngine {
    fn start(&mut self) -> Result<()> {
        self.page
            .validate()
            .map_err(|reason| ForgeError::composition(Stage::Start, reason))?;
        let fonts = FontBook::from_config(&self.metric_fonts)
            .map_err(|reason| ForgeError::composition(Stage::Start, reason))?;
        self.fonts = Some(fonts);
        log::debug!(
            "Engine started ({}×{} pt, margin {:.2} pt)",
            self.page.width_pt,
            self.page.height_pt,
            self.page.margin_pt
        );
        Ok(())
    }

    fn load_source(&mut self, path: &Path, timeout: Duration) -> Result<()> {
        let fonts = self
            .fonts
            .as_ref()
            .ok_or_else(|| ForgeError::composition(Stage::Load, "engine is not running"))?;
        let started = Instant::now();

        let source = fs::read_to_string(path).map_err(|e| {
            ForgeError::composition(Stage::Load, format!("cannot read {}: {e}", path.display()))
        })?;
        let nodes = markup::parse(&source);
        let body = markup::body_children(&nodes);
        let sources = markup::image_sources(&body);

        let remaining = timeout.saturating_sub(started.elapsed());
        let resources = load_bounded(sources, remaining)?;

        let styled = build_styled_tree(&body, None);
        let boxes = compute_layout(&styled, &self.page, fonts, &resources.image_sizes())
            .map_err(|e| ForgeError::composition(Stage::Load, format!("layout failed: {e}")))?;
        let plan = paginate(&boxes, &self.page, &self.title, fonts);

        log::debug!(
            "Loaded {} ({} bytes, {} image(s), {} page(s)) in {:?}",
            path.display(),
            source.len(),
            resources.len(),
            plan.page_count(),
            started.elapsed()
        );
        self.loaded = Some(Loaded { plan, resources });
        Ok(())
    }

    fn capture(&mut self) -> Result<RenderedDocument> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| ForgeError::composition(Stage::Capture, "no source loaded"))?;
        let bytes = write_pdf(&loaded.plan, &loaded.resources)
            .map_err(|reason| ForgeError::composition(Stage::Capture, reason))?;
        Ok(RenderedDocument::new(bytes, loaded.plan.page_count()))
    }

    fn shutdown(&mut self) {
        if self.fonts.take().is_some() {
            log::debug!("Engine shut down");
        }
        self.loaded = None;
    }
}

/// Load resources on a worker thread and give up after `timeout`. A worker
/// that overruns is left to finish on its own; its result is discarded.
fn load_bounded(sources: Vec<String>, timeout: Duration) -> Result<ResourceSet> {
    if sources.is_empty() {
        return Ok(ResourceSet::new());
    }
    let count = sources.len();
    let timed_out = || {
        ForgeError::composition(
            Stage::Load,
            format!("timed out after {timeout:?} waiting for {count} resource(s)"),
        )
    };
    if timeout.is_zero() {
        return Err(timed_out());
    }
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("rx-forge-loader".into())
        .spawn(move || {
            // The receiver may be gone after a timeout.
            let _ = tx.send(resources::load_all(&sources));
        })
        .map_err(|e| ForgeError::composition(Stage::Load, format!("cannot spawn loader: {e}")))?;

    rx.recv_timeout(timeout).map_err(|e| match e {
        mpsc::RecvTimeoutError::Timeout => timed_out(),
        mpsc::RecvTimeoutError::Disconnected => {
            ForgeError::composition(Stage::Load, "resource loader exited without a result")
        }
    })
}
