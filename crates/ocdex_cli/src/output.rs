use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use owo_colors::OwoColorize;

/// Standard output formatting for the CLI
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    /// Print a system/status message (indented)
    pub fn status(&self, message: &str) {
        println!("  {}", message.dimmed());
    }

    /// Print an info message (indented)
    pub fn info(&self, label: &str, value: &str) {
        println!("  {} {}", label.bright_blue(), value);
    }

    /// Print a success message (indented)
    pub fn success(&self, message: &str) {
        println!("  {} {}", "✓".bright_green(), message);
    }

    /// Print a warning message (indented)
    pub fn warning(&self, message: &str) {
        println!("  {} {}", "⚠".yellow(), message);
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        println!();
        println!("{}", title.bright_cyan().bold());
        println!("{}", "─".repeat(40).dimmed());
    }

    /// Print a list item (already indented)
    pub fn list_item(&self, item: &str) {
        println!("    • {}", item);
    }

    /// Print a key-value pair (indented)
    pub fn kv(&self, key: &str, value: &str) {
        println!("  {} {}", format!("{}:", key).dimmed(), value);
    }

    /// Print rows under a header as a table
    pub fn table(&self, header: &[&str], rows: Vec<Vec<String>>) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(header.to_vec());
        for row in rows {
            table.add_row(row);
        }
        println!("{table}");
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

/// Mask all but the edges of a secret
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 10 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
