//! Template documents – the prescription markup split into literal text and
//! named placeholder slots.
//!
//! Two token shapes are recognised: `{{NAME}}` (upper-case letters, digits
//! and underscores) and the two bare image tokens `LOGO_URL_PLACEHOLDER` /
//! `SIGNATURE_URL_PLACEHOLDER`, which live inside `src` attributes.

use std::fs;
use std::path::Path;

use crate::error::{ForgeError, Result};

/// How many occurrences of a placeholder a single render fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// Only the first occurrence is filled; later copies stay unresolved.
    First,
    /// Every occurrence in the document is filled with the same value.
    Every,
}

/// Every placeholder the prescription template defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placeholder {
    PatientName,
    PatientNationalId,
    PatientAddress,
    PatientPhone,
    PatientEmail,
    MedicationName,
    MedicationDosage,
    MedicationQuantity,
    MedicationInstructions,
    HowToUse,
    Purpose,
    DesiredEffect,
    WhenToSeekDoctor,
    CurrentDate,
    CurrentYear,
    LogoUrl,
    SignatureUrl,
}

impl Placeholder {
    pub const ALL: [Placeholder; 17] = [
        Placeholder::PatientName,
        Placeholder::PatientNationalId,
        Placeholder::PatientAddress,
        Placeholder::PatientPhone,
        Placeholder::PatientEmail,
        Placeholder::MedicationName,
        Placeholder::MedicationDosage,
        Placeholder::MedicationQuantity,
        Placeholder::MedicationInstructions,
        Placeholder::HowToUse,
        Placeholder::Purpose,
        Placeholder::DesiredEffect,
        Placeholder::WhenToSeekDoctor,
        Placeholder::CurrentDate,
        Placeholder::CurrentYear,
        Placeholder::LogoUrl,
        Placeholder::SignatureUrl,
    ];

    /// The literal token text as it appears in the template.
    pub fn token(self) -> &'static str {
        match self {
            Placeholder::PatientName => "{{NOME_PACIENTE}}",
            Placeholder::PatientNationalId => "{{CPF_PACIENTE}}",
            Placeholder::PatientAddress => "{{ENDERECO_PACIENTE}}",
            Placeholder::PatientPhone => "{{TELEFONE_PACIENTE}}",
            Placeholder::PatientEmail => "{{EMAIL_PACIENTE}}",
            Placeholder::MedicationName => "{{NOME_MEDICAMENTO}}",
            Placeholder::MedicationDosage => "{{DOSAGEM_MEDICAMENTO}}",
            Placeholder::MedicationQuantity => "{{QUANTIDADE_MEDICAMENTO}}",
            Placeholder::MedicationInstructions => "{{POSOLOGIA_MEDICAMENTO}}",
            Placeholder::HowToUse => "{{COMO_USAR}}",
            Placeholder::Purpose => "{{PARA_QUE_SERVE}}",
            Placeholder::DesiredEffect => "{{EFEITO_DESEJADO}}",
            Placeholder::WhenToSeekDoctor => "{{QUANDO_PROCURAR_MEDICO}}",
            Placeholder::CurrentDate => "{{DATA_ATUAL}}",
            Placeholder::CurrentYear => "{{ANO_ATUAL}}",
            Placeholder::LogoUrl => "LOGO_URL_PLACEHOLDER",
            Placeholder::SignatureUrl => "SIGNATURE_URL_PLACEHOLDER",
        }
    }

    /// Medication name and dosage are repeated across both pages; everything
    /// else is filled once.
    pub fn occurrence(self) -> Occurrence {
        match self {
            Placeholder::MedicationName | Placeholder::MedicationDosage => Occurrence::Every,
            _ => Occurrence::First,
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.token() == token)
    }
}

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Slot(Placeholder),
    /// A `{{NAME}}` token with no substitution rule; kept verbatim.
    Unknown(String),
}

/// A parsed template: the ordered segment list plus the raw text it came from.
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    segments: Vec<Segment>,
    source_len: usize,
}

const BARE_TOKENS: [Placeholder; 2] = [Placeholder::LogoUrl, Placeholder::SignatureUrl];

impl TemplateDocument {
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while let Some((start, len, segment)) = next_token(rest) {
            literal.push_str(&rest[..start]);
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(segment);
            rest = &rest[start + len..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            segments,
            source_len: text.len(),
        }
    }

    /// Read and parse the template at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ForgeError::TemplateUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded template {} ({} bytes)", path.display(), text.len());
        Ok(Self::parse(&text))
    }

    /// The template compiled into the crate.
    pub fn embedded() -> Self {
        Self::parse(crate::templates::prescription_template())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Number of times `placeholder` occurs in the template.
    pub fn occurrences(&self, placeholder: Placeholder) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Slot(p) if *p == placeholder))
            .count()
    }
}

/// Find the earliest token in `text`: `(byte offset, byte length, segment)`.
fn next_token(text: &str) -> Option<(usize, usize, Segment)> {
    let mut best: Option<(usize, usize, Segment)> = None;

    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find("{{") {
        let open = search_from + rel;
        match braced_token_len(&text[open..]) {
            Some(len) => {
                let token = &text[open..open + len];
                let segment = match Placeholder::from_token(token) {
                    Some(p) => Segment::Slot(p),
                    None => Segment::Unknown(token.to_string()),
                };
                best = Some((open, len, segment));
                break;
            }
            None => search_from = open + 1,
        }
    }

    for placeholder in BARE_TOKENS {
        if let Some(pos) = text.find(placeholder.token()) {
            if best.as_ref().map_or(true, |(b, _, _)| pos < *b) {
                best = Some((pos, placeholder.token().len(), Segment::Slot(placeholder)));
            }
        }
    }

    best
}

/// Length of a well-formed `{{NAME}}` token at the start of `text`.
fn braced_token_len(text: &str) -> Option<usize> {
    let inner = text.strip_prefix("{{")?;
    let name_len = inner
        .bytes()
        .take_while(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'_')
        .count();
    if name_len == 0 || !inner[name_len..].starts_with("}}") {
        return None;
    }
    Some(2 + name_len + 2)
}
