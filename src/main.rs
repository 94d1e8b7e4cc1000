//! rx-forge – generate a prescription PDF.
//!
//! Usage:
//!   rx-forge [output.pdf] [--event event.json] [--product NAME] [--template PATH]
//!
//! Without `--event` the sample patient is used and the PDF is written to
//! `receita_teste.pdf`. With `--event` the patient comes from a paid
//! checkout-session event and the default output is `receita_<session id>.pdf`.

use std::{env, fs, path::PathBuf, process};

use rx_forge::config::ForgeConfig;
use rx_forge::intake::{parse_event, patient_from_session};
use rx_forge::pipeline::{sample_medication, sample_patient, Forge, SAMPLE_PRODUCT};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut output_path: Option<PathBuf> = None;
    let mut event_path: Option<PathBuf> = None;
    let mut product: Option<String> = None;
    let mut template: Option<PathBuf> = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--event" | "-e" => event_path = Some(PathBuf::from(value_of(&mut iter, arg, &args[0]))),
            "--product" | "-p" => product = Some(value_of(&mut iter, arg, &args[0])),
            "--template" | "-t" => template = Some(PathBuf::from(value_of(&mut iter, arg, &args[0]))),
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
            path => {
                if output_path.is_some() {
                    eprintln!("Unexpected argument: {path}");
                    print_usage(&args[0]);
                    process::exit(1);
                }
                output_path = Some(PathBuf::from(path));
            }
        }
    }

    let mut config = ForgeConfig::from_env();
    if template.is_some() {
        config.template_path = template;
    }
    let forge = match Forge::new(config) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let (patient, default_output) = match &event_path {
        None => (sample_patient(), PathBuf::from("receita_teste.pdf")),
        Some(path) => {
            let json = match fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error reading '{}': {e}", path.display());
                    process::exit(1);
                }
            };
            match parse_event(&json) {
                Ok(Some(session)) => (
                    patient_from_session(&session),
                    PathBuf::from(session.output_file_name()),
                ),
                Ok(None) => {
                    eprintln!("Event is not a paid checkout session; nothing to generate.");
                    process::exit(0);
                }
                Err(e) => {
                    eprintln!("Error parsing event '{}': {e}", path.display());
                    process::exit(1);
                }
            }
        }
    };
    let output = output_path.unwrap_or(default_output);
    let product = product.as_deref().unwrap_or(SAMPLE_PRODUCT);

    let document = match forge.generate(&patient, &sample_medication(), product) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error generating prescription: {e}");
            process::exit(1);
        }
    };

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Error creating output directory: {e}");
                process::exit(1);
            }
        }
    }
    if let Err(e) = document.save(&output) {
        eprintln!("Error writing '{}': {e}", output.display());
        process::exit(1);
    }
    let pages = document.page_count();
    eprintln!(
        "Wrote '{}' ({} bytes, {} page{})",
        output.display(),
        document.len(),
        pages,
        if pages == 1 { "" } else { "s" }
    );
}

fn value_of<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str, prog: &str) -> String {
    match iter.next() {
        Some(v) => v.clone(),
        None => {
            eprintln!("Missing value for {flag}");
            print_usage(prog);
            process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("rx-forge – prescription PDF generator");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} [output.pdf] [--event event.json] [--product NAME] [--template PATH]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [output.pdf]     Output path (default: receita_teste.pdf, or receita_<id>.pdf with --event)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --event, -e      Paid checkout.session.completed event (JSON) to take the patient from");
    eprintln!("  --product, -p    Product name for the instruction lookup (default: {SAMPLE_PRODUCT})");
    eprintln!("  --template, -t   Template file (default: RX_TEMPLATE_PATH, else the built-in template)");
    eprintln!("  --help           Print this message");
    eprintln!();
    eprintln!("Environment: RX_TEMPLATE_PATH, RX_ASSETS_DIR, RX_SCRATCH_DIR, RX_LOAD_TIMEOUT_SECS,");
    eprintln!("             RX_CATALOG_PATH, RX_FONT_REGULAR, RX_FONT_BOLD, RUST_LOG");
}
