use miette::Result;
use ocdex_core::Catalog;
use ocdex_core::catalog::{Ability, Move, SUBSET_CUTOFF, SpeciesData, join_types};

use crate::Entry;
use crate::output::Output;

/// Rank catalog entries of one kind against `query`
fn ranked<'a, T>(
    catalog: &Catalog,
    entries: Vec<&'a T>,
    name: impl Fn(&T) -> &str,
    query: &str,
    limit: usize,
) -> Vec<(&'a T, f64)> {
    let names: Vec<&str> = entries.iter().map(|e| name(e)).collect();
    catalog
        .matcher()
        .extract(query, &names, SUBSET_CUTOFF)
        .into_iter()
        .take(limit)
        .map(|m| (entries[m.index], m.score))
        .collect()
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Search the bundled catalog
pub fn search(kind: Entry, query: &str, limit: usize) -> Result<()> {
    let output = Output::new();
    let catalog = Catalog::bundled()?;

    let (header, rows): (&[&str], Vec<Vec<String>>) = match kind {
        Entry::Species => {
            let all: Vec<&SpeciesData> = catalog.all_species().map(|s| s.as_ref()).collect();
            let rows = ranked(&catalog, all, |s| s.name.as_str(), query, limit)
                .into_iter()
                .map(|(s, score)| {
                    vec![
                        s.name.to_string(),
                        join_types(&s.types),
                        format!("{:?}", s.class),
                        s.abilities
                            .iter()
                            .map(|a| a.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                        format!("{score:.0}"),
                    ]
                })
                .collect();
            (&["Species", "Types", "Class", "Abilities", "Score"][..], rows)
        }
        Entry::Ability => {
            let all: Vec<&Ability> = catalog.all_abilities().map(|a| a.as_ref()).collect();
            let rows = ranked(&catalog, all, |a| a.name.as_str(), query, limit)
                .into_iter()
                .map(|(a, score)| vec![a.name.to_string(), a.description.clone(), format!("{score:.0}")])
                .collect();
            (&["Ability", "Description", "Score"][..], rows)
        }
        Entry::Move => {
            let all: Vec<&Move> = catalog.all_moves().map(|m| m.as_ref()).collect();
            let rows = ranked(&catalog, all, |m| m.name.as_str(), query, limit)
                .into_iter()
                .map(|(m, score)| {
                    vec![
                        m.name.to_string(),
                        m.typing.to_string(),
                        format!("{:?}", m.category),
                        or_dash(m.power),
                        or_dash(m.accuracy),
                        m.pp.to_string(),
                        format!("{score:.0}"),
                    ]
                })
                .collect();
            (&["Move", "Type", "Category", "Power", "Accuracy", "PP", "Score"][..], rows)
        }
    };

    if rows.is_empty() {
        output.warning(&format!("Nothing matches \"{query}\""));
        return Ok(());
    }
    output.table(header, rows);
    Ok(())
}
