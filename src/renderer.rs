//! Template renderer – merges patient, medication, instruction, date and
//! asset values into a [`TemplateDocument`], producing the resolved source
//! handed to the compositor.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, NaiveDate};

use crate::catalog::InstructionEntry;
use crate::error::{ForgeError, Result};
use crate::patient::{present, MedicationData, PatientData};
use crate::resources;
use crate::template::{Occurrence, Placeholder, Segment, TemplateDocument};

/// 1×1 transparent PNG used whenever an image asset is missing.
pub const FALLBACK_PIXEL_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

pub const PATIENT_NAME_FALLBACK: &str = "Nome não informado";
pub const NATIONAL_ID_FALLBACK: &str = "CPF não informado";
pub const ADDRESS_FALLBACK: &str = "Endereço não informado";
pub const PHONE_FALLBACK: &str = "Telefone não informado";
pub const EMAIL_FALLBACK: &str = "Email não informado";
pub const MEDICATION_NAME_FALLBACK: &str = "Medicamento não informado";
pub const DOSAGE_INSTRUCTIONS_FALLBACK: &str = "Posologia não informada";
pub const INSTRUCTION_FALLBACK: &str = "Informação não disponível";

/// How an image placeholder is satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetReference {
    /// The asset exists on disk and is referenced by a `file://` URI.
    LocalFile(PathBuf),
    /// The asset is missing; the inline transparent pixel stands in.
    InlineFallback,
}

impl AssetReference {
    /// Never fails: a missing or unresolvable file becomes the inline pixel.
    pub fn resolve(path: &Path) -> Self {
        if !path.is_file() {
            log::debug!("Asset {} missing; using inline pixel", path.display());
            return AssetReference::InlineFallback;
        }
        match path.canonicalize() {
            Ok(abs) => AssetReference::LocalFile(abs),
            Err(e) => {
                log::debug!("Asset {} unresolvable ({e}); using inline pixel", path.display());
                AssetReference::InlineFallback
            }
        }
    }

    pub fn uri(&self) -> String {
        match self {
            AssetReference::LocalFile(path) => resources::file_uri(path),
            AssetReference::InlineFallback => FALLBACK_PIXEL_URI.to_string(),
        }
    }
}

/// Values that depend on when and where the render happens.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub date: NaiveDate,
    pub logo: AssetReference,
    pub signature: AssetReference,
}

impl RenderContext {
    /// Today's date with both assets resolved against the filesystem.
    pub fn now(logo_path: &Path, signature_path: &Path) -> Self {
        Self {
            date: Local::now().date_naive(),
            logo: AssetReference::resolve(logo_path),
            signature: AssetReference::resolve(signature_path),
        }
    }

    /// pt-BR short date, `dd/mm/yyyy`.
    pub fn formatted_date(&self) -> String {
        self.date.format("%d/%m/%Y").to_string()
    }

    pub fn year(&self) -> String {
        self.date.year().to_string()
    }
}

/// A template with every placeholder substituted, ready for composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource(String);

impl ResolvedSource {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fill `template` with the supplied data.
///
/// Medication name and dosage fill every occurrence; all other placeholders
/// fill only their first occurrence. Any token left over afterwards (a
/// duplicated single-occurrence token, or a token with no rule) fails the
/// render with [`ForgeError::UnresolvedPlaceholder`].
pub fn render(
    template: &TemplateDocument,
    patient: &PatientData,
    medication: &MedicationData,
    instructions: &InstructionEntry,
    ctx: &RenderContext,
) -> Result<ResolvedSource> {
    let mut out = String::with_capacity(template.source_len() + 1024);
    let mut filled: HashSet<Placeholder> = HashSet::new();
    let mut leftovers: BTreeMap<usize, String> = BTreeMap::new();

    for (index, segment) in template.segments().iter().enumerate() {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Slot(placeholder) => {
                let fill = match placeholder.occurrence() {
                    Occurrence::Every => true,
                    Occurrence::First => filled.insert(*placeholder),
                };
                if fill {
                    let value = value_for(*placeholder, patient, medication, instructions, ctx);
                    out.push_str(&escape_html(&value));
                } else {
                    out.push_str(placeholder.token());
                    leftovers.insert(index, placeholder.token().to_string());
                }
            }
            Segment::Unknown(token) => {
                out.push_str(token);
                leftovers.insert(index, token.clone());
            }
        }
    }

    if let Some(first) = leftovers.values().next() {
        return Err(ForgeError::UnresolvedPlaceholder {
            token: first.clone(),
            count: leftovers.len(),
        });
    }

    log::debug!("Rendered template into {} bytes of markup", out.len());
    Ok(ResolvedSource(out))
}

fn value_for(
    placeholder: Placeholder,
    patient: &PatientData,
    medication: &MedicationData,
    instructions: &InstructionEntry,
    ctx: &RenderContext,
) -> String {
    let instruction = |text: &str| {
        if text.trim().is_empty() {
            INSTRUCTION_FALLBACK.to_string()
        } else {
            text.to_string()
        }
    };

    match placeholder {
        Placeholder::PatientName => or_fallback(&patient.name, PATIENT_NAME_FALLBACK),
        Placeholder::PatientNationalId => or_fallback(&patient.national_id, NATIONAL_ID_FALLBACK),
        Placeholder::PatientAddress => or_fallback(&patient.address, ADDRESS_FALLBACK),
        Placeholder::PatientPhone => or_fallback(&patient.phone, PHONE_FALLBACK),
        Placeholder::PatientEmail => or_fallback(&patient.email, EMAIL_FALLBACK),
        Placeholder::MedicationName => or_fallback(&medication.name, MEDICATION_NAME_FALLBACK),
        Placeholder::MedicationDosage => or_fallback(&medication.dosage, ""),
        Placeholder::MedicationQuantity => or_fallback(&medication.quantity, ""),
        Placeholder::MedicationInstructions => {
            or_fallback(&medication.dosage_instructions, DOSAGE_INSTRUCTIONS_FALLBACK)
        }
        Placeholder::HowToUse => instruction(&instructions.how_to_use),
        Placeholder::Purpose => instruction(&instructions.purpose),
        Placeholder::DesiredEffect => instruction(&instructions.desired_effect),
        Placeholder::WhenToSeekDoctor => instruction(&instructions.when_to_seek_doctor),
        Placeholder::CurrentDate => ctx.formatted_date(),
        Placeholder::CurrentYear => ctx.year(),
        Placeholder::LogoUrl => ctx.logo.uri(),
        Placeholder::SignatureUrl => ctx.signature.uri(),
    }
}

fn or_fallback(field: &Option<String>, fallback: &str) -> String {
    match present(field) {
        Some(value) => value.to_string(),
        None => fallback.to_string(),
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
