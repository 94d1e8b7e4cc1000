//! Runtime configuration for the prescription pipeline.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// 1 cm expressed in PDF points.
pub const CM_PT: f32 = 72.0 / 2.54;

/// Fixed page geometry used for composition.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSetup {
    /// Page width in points (default: A4 = 595.28).
    pub width_pt: f32,
    /// Page height in points (default: A4 = 841.89).
    pub height_pt: f32,
    /// Uniform margin on all four sides, in points (default: 1 cm).
    pub margin_pt: f32,
    /// Paint element backgrounds into the PDF.
    pub print_background: bool,
}

impl PageSetup {
    pub fn a4() -> Self {
        Self {
            width_pt: 595.28,
            height_pt: 841.89,
            margin_pt: CM_PT,
            print_background: true,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width_pt - 2.0 * self.margin_pt
    }

    pub fn content_height(&self) -> f32 {
        self.height_pt - 2.0 * self.margin_pt
    }

    /// Reject geometry that leaves no printable area.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.width_pt > 0.0 && self.height_pt > 0.0) {
            return Err(format!(
                "page size must be positive, got {}×{} pt",
                self.width_pt, self.height_pt
            ));
        }
        if self.margin_pt < 0.0 || self.content_width() <= 0.0 || self.content_height() <= 0.0 {
            return Err(format!(
                "margin of {} pt leaves no content area on a {}×{} pt page",
                self.margin_pt, self.width_pt, self.height_pt
            ));
        }
        Ok(())
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        Self::a4()
    }
}

/// Optional TrueType faces used for text measurement. Text is drawn with the
/// builtin Helvetica, so metric-compatible faces (e.g. Liberation Sans) give
/// the most faithful line wrapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricFonts {
    pub regular: Option<PathBuf>,
    pub bold: Option<PathBuf>,
}

/// Everything the pipeline reads from its deployment.
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    /// Template file; `None` uses the embedded prescription template.
    pub template_path: Option<PathBuf>,
    pub logo_path: PathBuf,
    pub signature_path: PathBuf,
    /// Directory for per-call scratch copies of the resolved source
    /// (default: the system temp dir).
    pub scratch_dir: Option<PathBuf>,
    /// Upper bound on loading the source and its embedded images.
    pub load_timeout: Duration,
    pub page: PageSetup,
    pub fonts: MetricFonts,
    /// JSON file with extra catalog entries.
    pub catalog_path: Option<PathBuf>,
    /// Document title embedded in the PDF metadata.
    pub title: String,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            template_path: None,
            logo_path: PathBuf::from("assets/logo.png"),
            signature_path: PathBuf::from("assets/signature.png"),
            scratch_dir: None,
            load_timeout: Duration::from_secs(30),
            page: PageSetup::a4(),
            fonts: MetricFonts::default(),
            catalog_path: None,
            title: "Receita Médica".to_string(),
        }
    }
}

impl ForgeConfig {
    /// Defaults overridden by a `.env` file (if any) and `RX_*` variables.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("RX_TEMPLATE_PATH") {
            config.template_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("RX_ASSETS_DIR") {
            let dir = PathBuf::from(v);
            config.logo_path = dir.join("logo.png");
            config.signature_path = dir.join("signature.png");
        }
        if let Some(v) = get("RX_SCRATCH_DIR") {
            config.scratch_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("RX_LOAD_TIMEOUT_SECS") {
            match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.load_timeout = Duration::from_secs(secs),
                _ => log::warn!("Ignoring invalid RX_LOAD_TIMEOUT_SECS={v:?}"),
            }
        }
        if let Some(v) = get("RX_CATALOG_PATH") {
            config.catalog_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("RX_FONT_REGULAR") {
            config.fonts.regular = Some(PathBuf::from(v));
        }
        if let Some(v) = get("RX_FONT_BOLD") {
            config.fonts.bold = Some(PathBuf::from(v));
        }
        config
    }
}
