use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};

fn main() {
    println!("cargo:rerun-if-changed=data/");

    // Drafts record the catalog revision they were written against
    let mut hasher = DefaultHasher::new();

    let data_files = ["data/species.json", "data/abilities.json", "data/moves.json"];

    for file in &data_files {
        if let Ok(content) = fs::read_to_string(file) {
            content.hash(&mut hasher);
        }
    }

    println!("cargo:rustc-env=OCDEX_CATALOG_REVISION={:016x}", hasher.finish());
}
