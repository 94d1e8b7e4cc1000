//! Integration tests for the prescription pipeline.
//!
//! These tests validate:
//! - The sample prescription composes to two A4 pages
//! - Composition is repeatable page for page
//! - Missing assets degrade to the inline pixel instead of failing
//! - Engines and scratch files are released when composition fails
//! - Concurrent calls share nothing but the configuration
//! - Event intake feeds the pipeline end to end

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use rx_forge::config::{ForgeConfig, MetricFonts, PageSetup};
use rx_forge::engine::{LayoutEngine, NativeEngine};
use rx_forge::error::{ForgeError, Result, Stage};
use rx_forge::intake::{parse_event, patient_from_session};
use rx_forge::page_plan::{PagePlan, PlacedBox};
use rx_forge::pipeline::{sample_medication, sample_patient, Forge, SAMPLE_PRODUCT};
use rx_forge::renderer::{self, FALLBACK_PIXEL_URI};
use rx_forge::template::{Placeholder, TemplateDocument};
use rx_forge::{
    Compositor, InstructionCatalog, MedicationData, PatientData, RenderedDocument, ResolvedSource,
};

// =====================================================================
// Helpers
// =====================================================================

/// A forge whose assets are missing and whose scratch files land in `scratch`.
fn forge_in(scratch: &Path) -> Forge {
    Forge::new(ForgeConfig {
        logo_path: PathBuf::from("/nonexistent/rx-forge/logo.png"),
        signature_path: PathBuf::from("/nonexistent/rx-forge/signature.png"),
        scratch_dir: Some(scratch.to_path_buf()),
        ..ForgeConfig::default()
    })
    .unwrap()
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn entries(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

/// One fingerprint per page over its decoded content operations. XObject
/// names are skipped because printpdf generates them per document.
fn page_fingerprints(bytes: &[u8]) -> Vec<String> {
    let doc = lopdf::Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let raw = doc.get_page_content(page_id).unwrap();
            let content = lopdf::content::Content::decode(&raw).unwrap();
            let mut hasher = Sha256::new();
            for op in &content.operations {
                hasher.update(op.operator.as_bytes());
                if op.operator != "Do" {
                    hasher.update(format!("{:?}", op.operands).as_bytes());
                }
            }
            format!("{:x}", hasher.finalize())
        })
        .collect()
}

fn media_boxes(bytes: &[u8]) -> Vec<(f32, f32)> {
    let doc = lopdf::Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
            let mb = page.get(b"MediaBox").unwrap().as_array().unwrap();
            let num = |o: &lopdf::Object| o.as_float().unwrap();
            (num(&mb[2]) - num(&mb[0]), num(&mb[3]) - num(&mb[1]))
        })
        .collect()
}

fn page_texts(plan: &PagePlan) -> Vec<String> {
    fn walk(b: &PlacedBox, out: &mut String) {
        if let Some(text) = &b.text {
            for line in &text.lines {
                out.push_str(&line.text);
                out.push('\n');
            }
        }
        b.children.iter().for_each(|c| walk(c, out));
    }
    plan.pages
        .iter()
        .map(|page| {
            let mut out = String::new();
            page.boxes.iter().for_each(|b| walk(b, &mut out));
            out
        })
        .collect()
}

/// Lay out `source` with a native engine and return its page plan.
fn plan_for(source: &ResolvedSource) -> PagePlan {
    let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
    file.write_all(source.as_str().as_bytes()).unwrap();
    let mut engine = NativeEngine::new(PageSetup::a4(), MetricFonts::default(), "Receita");
    engine.start().unwrap();
    engine.load_source(file.path(), Duration::from_secs(10)).unwrap();
    let plan = engine.page_plan().unwrap().clone();
    engine.shutdown();
    plan
}

// =====================================================================
// Lookup and render
// =====================================================================

#[test]
fn empty_patient_gets_every_fallback() {
    let forge = forge_in(&std::env::temp_dir());
    let source = forge
        .render(&PatientData::default(), &sample_medication(), SAMPLE_PRODUCT)
        .unwrap();
    let html = source.as_str();

    for fallback in [
        renderer::PATIENT_NAME_FALLBACK,
        renderer::NATIONAL_ID_FALLBACK,
        renderer::ADDRESS_FALLBACK,
        renderer::PHONE_FALLBACK,
        renderer::EMAIL_FALLBACK,
    ] {
        assert!(html.contains(fallback), "missing {fallback:?}");
    }
    for placeholder in [
        Placeholder::PatientName,
        Placeholder::PatientNationalId,
        Placeholder::PatientAddress,
        Placeholder::PatientPhone,
        Placeholder::PatientEmail,
    ] {
        assert!(!html.contains(placeholder.token()));
    }
}

#[test]
fn medication_name_and_dosage_fill_every_site() {
    let forge = forge_in(&std::env::temp_dir());
    let medication = MedicationData {
        name: Some("Xylofarma".into()),
        dosage: Some("7 mg".into()),
        quantity: Some("12 cápsulas".into()),
        dosage_instructions: Some("Uma cápsula à noite.".into()),
    };
    let source = forge
        .render(&sample_patient(), &medication, "Produto Desconhecido")
        .unwrap();
    let html = source.as_str();
    let template = TemplateDocument::embedded();

    let sites = template.occurrences(Placeholder::MedicationName);
    assert!(sites >= 2);
    assert_eq!(html.matches("Xylofarma").count(), sites);
    assert_eq!(
        html.matches("7 mg").count(),
        template.occurrences(Placeholder::MedicationDosage)
    );
    assert_eq!(html.matches("12 cápsulas").count(), 1);
    assert_eq!(html.matches("Uma cápsula à noite.").count(), 1);
}

#[test]
fn catalog_lookup_and_fallback() {
    let catalog = InstructionCatalog::seeded();
    let known = catalog.lookup(SAMPLE_PRODUCT);
    let unknown = catalog.lookup("Unknown Product");

    assert_ne!(known, unknown);
    assert_eq!(unknown, catalog.fallback());
    for field in [
        &unknown.how_to_use,
        &unknown.purpose,
        &unknown.desired_effect,
        &unknown.when_to_seek_doctor,
    ] {
        assert!(!field.trim().is_empty());
    }
}

// =====================================================================
// End-to-end composition
// =====================================================================

#[test]
fn sample_prescription_is_two_a4_pages() {
    let scratch = tempfile::tempdir().unwrap();
    let forge = forge_in(scratch.path());
    let doc = forge
        .generate(&sample_patient(), &sample_medication(), SAMPLE_PRODUCT)
        .unwrap();

    assert_valid_pdf(doc.as_bytes());
    assert_eq!(doc.page_count(), 2);
    let boxes = media_boxes(doc.as_bytes());
    assert_eq!(boxes.len(), 2);
    for (w, h) in boxes {
        assert!((w - 595.28).abs() < 0.5, "page width {w}");
        assert!((h - 841.89).abs() < 0.5, "page height {h}");
    }
    assert_eq!(entries(scratch.path()), 0, "scratch file left behind");
}

#[test]
fn composition_is_repeatable() {
    let scratch = tempfile::tempdir().unwrap();
    let forge = forge_in(scratch.path());
    let source = forge
        .render(&sample_patient(), &sample_medication(), SAMPLE_PRODUCT)
        .unwrap();

    let first = forge.compositor().compose(&source).unwrap();
    let second = forge.compositor().compose(&source).unwrap();

    assert_eq!(first.page_count(), second.page_count());
    assert_eq!(
        page_fingerprints(first.as_bytes()),
        page_fingerprints(second.as_bytes())
    );
}

#[test]
fn concurrent_generations_are_independent() {
    let scratch = tempfile::tempdir().unwrap();
    let forge = forge_in(scratch.path());

    let documents: Vec<RenderedDocument> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    forge
                        .generate(&sample_patient(), &sample_medication(), SAMPLE_PRODUCT)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(documents.len(), 4);
    let expected = page_fingerprints(documents[0].as_bytes());
    for doc in &documents {
        assert_valid_pdf(doc.as_bytes());
        assert_eq!(doc.page_count(), 2);
        assert_eq!(page_fingerprints(doc.as_bytes()), expected);
    }
    assert_eq!(entries(scratch.path()), 0, "scratch file left behind");
}

#[test]
fn missing_assets_still_compose() {
    let scratch = tempfile::tempdir().unwrap();
    let forge = forge_in(scratch.path());
    let source = forge
        .render(&PatientData::default(), &sample_medication(), SAMPLE_PRODUCT)
        .unwrap();
    assert_eq!(source.as_str().matches(FALLBACK_PIXEL_URI).count(), 2);

    let doc = forge.compositor().compose(&source).unwrap();
    assert!(!doc.is_empty());
    assert_valid_pdf(doc.as_bytes());
}

#[test]
fn present_assets_are_embedded() {
    let assets = tempfile::tempdir().unwrap();
    let pixel = rx_forge::resources::fetch(FALLBACK_PIXEL_URI).unwrap();
    fs::write(assets.path().join("logo.png"), &pixel).unwrap();
    fs::write(assets.path().join("signature.png"), &pixel).unwrap();

    let forge = Forge::new(ForgeConfig {
        logo_path: assets.path().join("logo.png"),
        signature_path: assets.path().join("signature.png"),
        ..ForgeConfig::default()
    })
    .unwrap();
    let source = forge
        .render(&sample_patient(), &sample_medication(), SAMPLE_PRODUCT)
        .unwrap();
    assert!(!source.as_str().contains(FALLBACK_PIXEL_URI));
    assert_eq!(source.as_str().matches("file://").count(), 2);

    let plan = plan_for(&source);
    let sources = plan.image_sources();
    assert_eq!(sources.len(), 2);
    assert!(sources.iter().all(|s| s.starts_with("file://")));

    let doc = forge.compositor().compose(&source).unwrap();
    let pdf = lopdf::Document::load_mem(doc.as_bytes()).unwrap();
    let images = pdf
        .objects
        .values()
        .filter(|obj| match obj {
            lopdf::Object::Stream(s) => {
                s.dict.get(b"Subtype").and_then(|v| v.as_name()).ok() == Some(&b"Image"[..])
            }
            _ => false,
        })
        .count();
    assert!(images >= 1, "no image XObject embedded");
}

// =====================================================================
// Layout of the prescription
// =====================================================================

#[test]
fn medication_appears_on_both_pages() {
    let forge = forge_in(&std::env::temp_dir());
    let source = forge
        .render(&sample_patient(), &sample_medication(), SAMPLE_PRODUCT)
        .unwrap();
    let plan = plan_for(&source);
    let texts = page_texts(&plan);

    assert_eq!(texts.len(), 2);
    assert!(texts[0].contains("Finasterida 1 mg"));
    assert!(texts[0].contains("João da Silva"));
    assert!(texts[1].contains("Instruções de Uso"));
    assert!(texts[1].contains("Finasterida 1 mg"));
    assert!(!texts[1].contains("João da Silva"));
}

#[test]
fn long_dosage_instructions_flow_onto_more_pages() {
    let forge = forge_in(&std::env::temp_dir());
    let medication = MedicationData {
        dosage_instructions: Some(
            "Tomar 1 comprimido de Zelorina por via oral, uma vez ao dia. ".repeat(400),
        ),
        ..sample_medication()
    };
    let source = forge
        .render(&sample_patient(), &medication, SAMPLE_PRODUCT)
        .unwrap();
    let plan = plan_for(&source);
    assert!(plan.page_count() > 2);

    fn check(b: &PlacedBox, bottom: f32) {
        if let Some(text) = &b.text {
            for line in &text.lines {
                let line_bottom = b.y + line.y_offset + text.line_height;
                assert!(line_bottom <= bottom + 0.5, "line drawn down to {line_bottom}");
            }
        }
        b.children.iter().for_each(|c| check(c, bottom));
    }
    let bottom = plan.page_height_pt - plan.margin_pt;
    for page in &plan.pages {
        page.boxes.iter().for_each(|b| check(b, bottom));
    }

    let all_text: String = page_texts(&plan).concat();
    assert_eq!(all_text.matches("Zelorina").count(), 400);
    assert!(page_texts(&plan).last().unwrap().contains("Instruções de Uso"));
}

#[test]
fn every_box_stays_inside_the_margins() {
    let forge = forge_in(&std::env::temp_dir());
    let source = forge
        .render(&sample_patient(), &sample_medication(), SAMPLE_PRODUCT)
        .unwrap();
    let plan = plan_for(&source);

    fn check(b: &PlacedBox, plan: &PagePlan) {
        let eps = 0.5;
        assert!(b.x >= plan.margin_pt - eps, "box starts at x={}", b.x);
        assert!(b.y >= plan.margin_pt - eps, "box starts at y={}", b.y);
        assert!(b.x + b.width <= plan.page_width_pt - plan.margin_pt + eps);
        assert!(b.y + b.height <= plan.page_height_pt - plan.margin_pt + eps);
        b.children.iter().for_each(|c| check(c, plan));
    }
    for page in &plan.pages {
        page.boxes.iter().for_each(|b| check(b, &plan));
    }
}

// =====================================================================
// Failure paths and cleanup
// =====================================================================

/// Wraps the native engine and tracks how many instances are running.
struct TrackedEngine {
    inner: NativeEngine,
    live: Arc<AtomicUsize>,
    running: bool,
}

impl LayoutEngine for TrackedEngine {
    fn start(&mut self) -> Result<()> {
        self.inner.start()?;
        self.running = true;
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_source(&mut self, path: &Path, timeout: Duration) -> Result<()> {
        self.inner.load_source(path, timeout)
    }

    fn capture(&mut self) -> Result<RenderedDocument> {
        self.inner.capture()
    }

    fn shutdown(&mut self) {
        self.inner.shutdown();
        if std::mem::take(&mut self.running) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

fn compose_tracked(config: &ForgeConfig, source: &ResolvedSource) -> (Result<RenderedDocument>, usize) {
    let live = Arc::new(AtomicUsize::new(0));
    let compositor = Compositor::from_config(config);
    let result = compositor.compose_with(
        || TrackedEngine {
            inner: compositor.native_engine(),
            live: Arc::clone(&live),
            running: false,
        },
        source,
    );
    (result, live.load(Ordering::SeqCst))
}

#[test]
fn forced_start_failure_leaves_nothing_behind() {
    let scratch = tempfile::tempdir().unwrap();
    let config = ForgeConfig {
        scratch_dir: Some(scratch.path().to_path_buf()),
        page: PageSetup {
            margin_pt: 400.0,
            ..PageSetup::a4()
        },
        ..ForgeConfig::default()
    };
    let (result, live) = compose_tracked(&config, &ResolvedSource::new("<p>Receita</p>"));

    assert!(matches!(
        result,
        Err(ForgeError::CompositionFailed { stage: Stage::Start, .. })
    ));
    assert_eq!(live, 0);
    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn unreadable_font_fails_start_and_cleans_up() {
    let scratch = tempfile::tempdir().unwrap();
    let fonts_dir = tempfile::tempdir().unwrap();
    let bogus = fonts_dir.path().join("regular.ttf");
    fs::write(&bogus, b"definitely not a font").unwrap();

    let config = ForgeConfig {
        scratch_dir: Some(scratch.path().to_path_buf()),
        fonts: MetricFonts {
            regular: Some(bogus),
            bold: None,
        },
        ..ForgeConfig::default()
    };
    let (result, live) = compose_tracked(&config, &ResolvedSource::new("<p>Receita</p>"));

    assert!(matches!(
        result,
        Err(ForgeError::CompositionFailed { stage: Stage::Start, .. })
    ));
    assert_eq!(live, 0);
    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn load_timeout_fails_and_cleans_up() {
    let scratch = tempfile::tempdir().unwrap();
    let config = ForgeConfig {
        scratch_dir: Some(scratch.path().to_path_buf()),
        load_timeout: Duration::ZERO,
        ..ForgeConfig::default()
    };
    let source = ResolvedSource::new(format!(r#"<img src="{FALLBACK_PIXEL_URI}">"#));
    let (result, live) = compose_tracked(&config, &source);

    match result {
        Err(ForgeError::CompositionFailed { stage, reason }) => {
            assert_eq!(stage, Stage::Load);
            assert!(reason.contains("timed out"), "{reason}");
        }
        other => panic!("expected a load failure, got {other:?}"),
    }
    assert_eq!(live, 0);
    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn successful_compose_releases_engine() {
    let scratch = tempfile::tempdir().unwrap();
    let config = ForgeConfig {
        scratch_dir: Some(scratch.path().to_path_buf()),
        ..ForgeConfig::default()
    };
    let (result, live) = compose_tracked(&config, &ResolvedSource::new("<p>Receita</p>"));
    assert_valid_pdf(result.unwrap().as_bytes());
    assert_eq!(live, 0);
    assert_eq!(entries(scratch.path()), 0);
}

// =====================================================================
// Templates
// =====================================================================

#[test]
fn duplicated_single_occurrence_token_fails_render() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("receita.html");
    fs::write(
        &template,
        "<p>{{NOME_PACIENTE}}</p><p>{{NOME_PACIENTE}}</p><p>{{NOME_MEDICAMENTO}}</p>",
    )
    .unwrap();
    let forge = Forge::new(ForgeConfig {
        template_path: Some(template),
        ..ForgeConfig::default()
    })
    .unwrap();

    let err = forge
        .generate(&sample_patient(), &sample_medication(), SAMPLE_PRODUCT)
        .unwrap_err();
    match err {
        ForgeError::UnresolvedPlaceholder { token, count } => {
            assert_eq!(token, "{{NOME_PACIENTE}}");
            assert_eq!(count, 1);
        }
        other => panic!("expected UnresolvedPlaceholder, got {other:?}"),
    }
}

#[test]
fn template_file_is_used_when_configured() {
    let scratch = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("receita.html");
    fs::write(
        &template,
        r#"<div><h1>{{NOME_MEDICAMENTO}} {{DOSAGEM_MEDICAMENTO}}</h1><p>{{NOME_PACIENTE}}</p></div>"#,
    )
    .unwrap();
    let forge = Forge::new(ForgeConfig {
        template_path: Some(template),
        scratch_dir: Some(scratch.path().to_path_buf()),
        ..ForgeConfig::default()
    })
    .unwrap();

    let doc = forge
        .generate(&sample_patient(), &sample_medication(), SAMPLE_PRODUCT)
        .unwrap();
    assert_eq!(doc.page_count(), 1);
}

// =====================================================================
// Event intake
// =====================================================================

#[test]
fn paid_event_produces_a_prescription() {
    let event = r#"{
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_test_a1",
            "payment_status": "paid",
            "customer_details": {
                "name": "Ana <Beatriz> & Filhos",
                "email": "ana@example.com",
                "address": {"line1": "Rua A, 1", "city": "Recife", "state": "PE",
                            "postal_code": "50000-000", "country": "BR"}
            }
        }}
    }"#;
    let session = parse_event(event).unwrap().unwrap();
    let patient = patient_from_session(&session);

    let scratch = tempfile::tempdir().unwrap();
    let forge = forge_in(scratch.path());
    let source = forge
        .render(&patient, &sample_medication(), SAMPLE_PRODUCT)
        .unwrap();
    assert!(source.as_str().contains("Ana &lt;Beatriz&gt; &amp; Filhos"));
    assert!(source.as_str().contains("CPF não informado"));

    let plan = plan_for(&source);
    assert!(page_texts(&plan)[0].contains("Ana <Beatriz> & Filhos"));

    let doc = forge.compositor().compose(&source).unwrap();
    assert_eq!(doc.page_count(), 2);
}
