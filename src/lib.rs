//! # rx-forge – prescription document pipeline
//!
//! Turns patient, medication and product data into a two-page prescription
//! PDF. The stages are:
//!
//! 1. **Lookup** – product name → usage instructions ([`catalog`])
//! 2. **Render** – fill the template's placeholders ([`template`], [`renderer`])
//! 3. **Compose** – drive a layout engine over the resolved markup
//!    ([`compositor`], [`engine`])
//!
//! The in-process engine parses the markup ([`markup`]), resolves styles
//! ([`style`]), lays out with Taffy ([`layout`]), paginates ([`pagination`])
//! and writes the PDF with printpdf ([`pdf`]).

pub mod catalog;
pub mod compositor;
pub mod config;
pub mod engine;
pub mod error;
pub mod fonts;
pub mod intake;
pub mod layout;
pub mod markup;
pub mod page_plan;
pub mod pagination;
pub mod patient;
pub mod pdf;
pub mod pipeline;
pub mod renderer;
pub mod resources;
pub mod style;
pub mod template;
pub mod templates;

pub use catalog::{InstructionCatalog, InstructionEntry};
pub use compositor::{Compositor, RenderedDocument};
pub use config::{ForgeConfig, PageSetup};
pub use engine::{LayoutEngine, NativeEngine};
pub use error::{ForgeError, Result, Stage};
pub use patient::{MedicationData, PatientData};
pub use pipeline::{generate_prescription, Forge};
pub use renderer::{render, AssetReference, RenderContext, ResolvedSource};
pub use template::{Placeholder, TemplateDocument};
