//! `vendorflow import` -- parse a materials CSV without a server.

use std::path::Path;
use std::process;

use vendorflow_engine::importer::{ensure_csv_upload, import_materials};
use vendorflow_engine::MaterialImport;

use crate::{report_error, OutputFormat};

pub(crate) fn cmd_import(file: &Path, output: OutputFormat, quiet: bool) {
    let name = file.display().to_string();
    if let Err(e) = ensure_csv_upload(&name, None) {
        report_error(&format!("error: {}", e), output, quiet);
        process::exit(1);
    }
    let reader = match std::fs::File::open(file) {
        Ok(f) => f,
        Err(e) => {
            report_error(&format!("error reading file '{}': {}", name, e), output, quiet);
            process::exit(1);
        }
    };
    let import = match import_materials(reader) {
        Ok(import) => import,
        Err(e) => {
            report_error(&format!("error parsing '{}': {}", name, e), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "materials": import.materials,
                "certification": import.certification,
            });
            let pretty = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => print!("{}", render_text(&import, quiet)),
    }
}

/// One line per material, then a total unless `quiet`.
fn render_text(import: &MaterialImport, quiet: bool) -> String {
    let mut out = String::new();
    for material in &import.materials {
        out.push_str(&format!(
            "{:<24} {:>10} x {:>10.2} = {:>12.2}\n",
            material.name, material.quantity, material.rate, material.total_cost
        ));
    }
    if !quiet {
        let total: f64 = import.materials.iter().map(|m| m.total_cost).sum();
        out.push_str(&format!(
            "{} materials, certification {}, total {:.2}\n",
            import.materials.len(),
            import.certification,
            total
        ));
    }
    out
}
