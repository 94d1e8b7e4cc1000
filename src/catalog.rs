//! Instruction catalog – maps a product name to its patient-facing usage
//! instructions.
//!
//! The catalog is built once at startup and shared by reference afterwards.
//! Lookups are exact and case-sensitive; anything unknown resolves to the
//! generic fallback entry so a document can always be produced.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

/// The four instruction paragraphs printed on the second page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionEntry {
    pub how_to_use: String,
    pub purpose: String,
    pub desired_effect: String,
    pub when_to_seek_doctor: String,
}

impl InstructionEntry {
    pub fn new(
        how_to_use: impl Into<String>,
        purpose: impl Into<String>,
        desired_effect: impl Into<String>,
        when_to_seek_doctor: impl Into<String>,
    ) -> Self {
        Self {
            how_to_use: how_to_use.into(),
            purpose: purpose.into(),
            desired_effect: desired_effect.into(),
            when_to_seek_doctor: when_to_seek_doctor.into(),
        }
    }

    /// Generic "follow your doctor's guidance" instructions.
    pub fn generic() -> Self {
        Self::new(
            "Siga as instruções do seu médico para o uso correto deste medicamento.",
            "Este medicamento foi prescrito especificamente para o seu tratamento.",
            "Os resultados podem variar de acordo com o tratamento e resposta individual.",
            "Procure seu médico se apresentar qualquer efeito colateral ou se sua condição não melhorar.",
        )
    }
}

/// Immutable product → instructions table with a fixed fallback entry.
#[derive(Debug, Clone)]
pub struct InstructionCatalog {
    entries: HashMap<String, InstructionEntry>,
    fallback: InstructionEntry,
}

impl InstructionCatalog {
    /// An empty catalog: every lookup yields the fallback entry.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            fallback: InstructionEntry::generic(),
        }
    }

    /// The catalog seeded with the three products sold in the reference
    /// deployment.
    pub fn seeded() -> Self {
        Self::empty()
            .with_entry(
                "Dutasterida 0,5 mg",
                InstructionEntry::new(
                    "Tomar 1 cápsula por via oral, uma vez ao dia, no mesmo horário, com ou sem alimentos.",
                    "Inibe a enzima 5-alfa-redutase, reduzindo os níveis de DHT. Indicado para alopecia androgenética masculina.",
                    "Redução progressiva da queda de cabelo e aumento da densidade capilar após 3 a 6 meses.",
                    "Alterações hormonais, sensibilidade mamária, disfunção sexual ou sintomas depressivos.",
                ),
            )
            .with_entry(
                "Finasterida 1 mg",
                InstructionEntry::new(
                    "Tomar 1 comprimido por via oral, uma vez ao dia, com ou sem alimentos.",
                    "Inibidor da 5-alfa-redutase. Reduz a queda de cabelo e estimula o crescimento capilar na alopecia androgenética.",
                    "Redução da queda e crescimento de novos fios geralmente observados entre 3 a 6 meses.",
                    "Disfunção erétil, diminuição da libido ou alterações no humor.",
                ),
            )
            .with_entry(
                "Minoxidil Oral 3 mg",
                InstructionEntry::new(
                    "Tomar 1 comprimido por via oral ao dia, com ou sem alimentos, conforme orientação médica.",
                    "Vasodilatador utilizado na alopecia androgenética. Estimula crescimento capilar e melhora a vascularização dos folículos.",
                    "Espessamento dos fios e aumento da densidade capilar após 2 a 4 meses.",
                    "Taquicardia, retenção de líquidos, ganho de peso, crescimento excessivo de pelos no corpo.",
                ),
            )
    }

    /// Builder-style insert, used while assembling the catalog at startup.
    pub fn with_entry(mut self, product: impl Into<String>, entry: InstructionEntry) -> Self {
        self.entries.insert(product.into(), entry);
        self
    }

    /// Merge entries from a JSON object keyed by product name. Returns the
    /// number of entries read. Existing products are replaced.
    pub fn extend_from_json(&mut self, json: &str) -> std::result::Result<usize, serde_json::Error> {
        let extra: HashMap<String, InstructionEntry> = serde_json::from_str(json)?;
        let count = extra.len();
        self.entries.extend(extra);
        Ok(count)
    }

    /// Seeded catalog plus the overrides in `path`.
    pub fn seeded_with_overrides(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| ForgeError::InvalidConfig {
            reason: format!("cannot read catalog file {}: {e}", path.display()),
        })?;
        let mut catalog = Self::seeded();
        let count = catalog
            .extend_from_json(&json)
            .map_err(|e| ForgeError::InvalidConfig {
                reason: format!("malformed catalog file {}: {e}", path.display()),
            })?;
        log::info!("Loaded {count} catalog override(s) from {}", path.display());
        Ok(catalog)
    }

    /// Instructions for `product`, or the fallback entry if it is unknown.
    pub fn lookup(&self, product: &str) -> &InstructionEntry {
        match self.entries.get(product) {
            Some(entry) => entry,
            None => {
                log::warn!("No instructions for product {product:?}; using generic entry");
                &self.fallback
            }
        }
    }

    pub fn fallback(&self) -> &InstructionEntry {
        &self.fallback
    }

    pub fn contains(&self, product: &str) -> bool {
        self.entries.contains_key(product)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InstructionCatalog {
    fn default() -> Self {
        Self::seeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_product_resolves_to_its_entry() {
        let catalog = InstructionCatalog::seeded();
        let entry = catalog.lookup("Finasterida 1 mg");
        assert!(entry.how_to_use.starts_with("Tomar 1 comprimido"));
        assert_ne!(entry, catalog.fallback());
    }

    #[test]
    fn unknown_product_resolves_to_fallback() {
        let catalog = InstructionCatalog::seeded();
        let entry = catalog.lookup("Unknown Product");
        assert_eq!(entry, catalog.fallback());
        assert!(!entry.how_to_use.is_empty());
        assert!(!entry.purpose.is_empty());
        assert!(!entry.desired_effect.is_empty());
        assert!(!entry.when_to_seek_doctor.is_empty());
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let catalog = InstructionCatalog::seeded();
        assert!(catalog.contains("Finasterida 1 mg"));
        assert_eq!(catalog.lookup("finasterida 1 mg"), catalog.fallback());
    }

    #[test]
    fn json_overrides_merge_over_seeded_entries() {
        let mut catalog = InstructionCatalog::seeded();
        let json = r#"{
            "Biotina 10 mg": {
                "howToUse": "Tomar 1 cápsula ao dia.",
                "purpose": "Suplemento.",
                "desiredEffect": "Fios mais fortes.",
                "whenToSeekDoctor": "Reações alérgicas."
            }
        }"#;
        assert_eq!(catalog.extend_from_json(json).unwrap(), 1);
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.lookup("Biotina 10 mg").purpose, "Suplemento.");
    }

    #[test]
    fn malformed_override_is_rejected() {
        let mut catalog = InstructionCatalog::seeded();
        assert!(catalog.extend_from_json(r#"{"X": {"howToUse": "a"}}"#).is_err());
        assert_eq!(catalog.len(), 3);
    }
}
