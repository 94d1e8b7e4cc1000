//! Pipeline – catalog lookup, template render and composition behind one
//! call.

use crate::catalog::InstructionCatalog;
use crate::compositor::{Compositor, RenderedDocument};
use crate::config::ForgeConfig;
use crate::error::Result;
use crate::patient::{MedicationData, PatientData};
use crate::renderer::{render, RenderContext, ResolvedSource};
use crate::template::TemplateDocument;

/// Product used for sample documents.
pub const SAMPLE_PRODUCT: &str = "Finasterida 1 mg";

/// Generates prescriptions. Holds only read-only state, so one instance can
/// serve concurrent calls.
#[derive(Debug, Clone)]
pub struct Forge {
    config: ForgeConfig,
    catalog: InstructionCatalog,
    compositor: Compositor,
}

impl Forge {
    /// Seeded catalog, plus the overrides file when one is configured.
    pub fn new(config: ForgeConfig) -> Result<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => InstructionCatalog::seeded_with_overrides(path)?,
            None => InstructionCatalog::seeded(),
        };
        Ok(Self::with_catalog(config, catalog))
    }

    pub fn with_catalog(config: ForgeConfig, catalog: InstructionCatalog) -> Self {
        let compositor = Compositor::from_config(&config);
        Self {
            config,
            catalog,
            compositor,
        }
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn catalog(&self) -> &InstructionCatalog {
        &self.catalog
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// The configured template file, read fresh on every call, or the
    /// embedded template when none is configured.
    pub fn load_template(&self) -> Result<TemplateDocument> {
        match &self.config.template_path {
            Some(path) => TemplateDocument::load(path),
            None => Ok(TemplateDocument::embedded()),
        }
    }

    /// Lookup and render, stopping short of composition.
    pub fn render(
        &self,
        patient: &PatientData,
        medication: &MedicationData,
        product: &str,
    ) -> Result<ResolvedSource> {
        let template = self.load_template()?;
        let instructions = self.catalog.lookup(product);
        let ctx = RenderContext::now(&self.config.logo_path, &self.config.signature_path);
        render(&template, patient, medication, instructions, &ctx)
    }

    /// `lookup → render → compose`.
    pub fn generate(
        &self,
        patient: &PatientData,
        medication: &MedicationData,
        product: &str,
    ) -> Result<RenderedDocument> {
        log::info!("Generating prescription for product {product:?}");
        let source = self.render(patient, medication, product)?;
        self.compositor.compose(&source)
    }
}

/// One-shot generation with configuration from the environment.
pub fn generate_prescription(
    patient: &PatientData,
    medication: &MedicationData,
    product: &str,
) -> Result<RenderedDocument> {
    Forge::new(ForgeConfig::from_env())?.generate(patient, medication, product)
}

pub fn sample_patient() -> PatientData {
    PatientData {
        name: Some("João da Silva".into()),
        national_id: Some("123.456.789-00".into()),
        address: Some("Rua Exemplo, 123 - São Paulo/SP".into()),
        phone: Some("(11) 98765-4321".into()),
        email: Some("joao.silva@exemplo.com".into()),
    }
}

pub fn sample_medication() -> MedicationData {
    MedicationData {
        name: Some("Finasterida".into()),
        dosage: Some("1 mg".into()),
        quantity: Some("30 comprimidos".into()),
        dosage_instructions: Some(
            "Tomar 1 comprimido por via oral, uma vez ao dia, com ou sem alimentos.".into(),
        ),
    }
}
