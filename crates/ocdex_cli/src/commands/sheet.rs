use miette::{IntoDiagnostic, Result};
use ocdex_core::{Catalog, Field, ParsedSheet, parse_sheet};
use owo_colors::OwoColorize;
use std::path::Path;

use crate::output::Output;

/// What still blocks submitting the parsed character
pub fn defects(sheet: &ParsedSheet, catalog: &Catalog) -> Vec<String> {
    Field::ALL
        .into_iter()
        .filter(|field| field.applicable(&sheet.character, sheet.template))
        .filter_map(|field| field.evaluate(&sheet.character, catalog))
        .collect()
}

/// Parse a sheet file the way `/submit` would and report the result
pub async fn check(path: &Path) -> Result<()> {
    let output = Output::new();
    let text = tokio::fs::read_to_string(path).await.into_diagnostic()?;
    let catalog = Catalog::bundled()?;
    let sheet = parse_sheet(&text, &catalog, 0, 0);

    output.section(&format!("Sheet: {}", path.display()));
    output.kv("Kind", sheet.template.label());
    let embed = sheet.character.embed();
    output.kv("Name", &embed.title);
    for field in &embed.fields {
        output.kv(&field.name, &field.value.replace('\n', ", "));
    }

    if !sheet.unresolved.is_empty() {
        output.section("Unresolved");
        for entry in &sheet.unresolved {
            output.list_item(&entry.yellow().to_string());
        }
    }

    let defects = defects(&sheet, &catalog);
    if defects.is_empty() {
        output.success("Ready to submit");
    } else {
        output.section("Blocking");
        for defect in &defects {
            output.list_item(defect);
        }
    }
    Ok(())
}
