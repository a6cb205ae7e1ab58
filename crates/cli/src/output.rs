//! Terminal output for `aliquot` subcommands

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Bordered table
    #[default]
    Table,
    Json,
    Yaml,
    /// `header: value` lines, one block per row
    Plain,
}

/// Rows that render as table columns
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn render_table<T: TableDisplay>(rows: &[T]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(T::headers());
    for row in rows {
        table.add_row(row.row());
    }
    format!("{table}\n")
}

fn render_plain<T: TableDisplay>(rows: &[T]) -> String {
    let headers = T::headers();
    rows.iter()
        .map(|row| {
            headers
                .iter()
                .zip(row.row())
                .map(|(header, value)| format!("{}: {}\n", header, value))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("---\n")
}

fn render_serialized<S: Serialize + ?Sized>(value: &S, format: OutputFormat) -> String {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        _ => serde_json::to_string_pretty(value)
            .map(|json| json + "\n")
            .map_err(|e| e.to_string()),
    };
    rendered.unwrap_or_else(|e| format!("<unserializable output: {}>\n", e))
}

/// Render one record; JSON and YAML emit an object rather than a list
pub fn render_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => render_table(std::slice::from_ref(item)),
        OutputFormat::Plain => render_plain(std::slice::from_ref(item)),
        OutputFormat::Json | OutputFormat::Yaml => render_serialized(item, format),
    }
}

/// Render records; an empty table or plain listing becomes a short notice
pub fn render_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> String {
    match format {
        OutputFormat::Table | OutputFormat::Plain if items.is_empty() => "Nothing to show.\n".to_string(),
        OutputFormat::Table => render_table(items),
        OutputFormat::Plain => render_plain(items),
        OutputFormat::Json | OutputFormat::Yaml => render_serialized(items, format),
    }
}

pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    print!("{}", render_item(item, format));
}

pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    print!("{}", render_list(items, format));
}

pub fn print_success(message: &str) {
    println!("{} {}", "✔".green().bold(), message);
}

/// Errors go to stderr so JSON output on stdout stays parseable
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✘".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "›".cyan().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: &'static str,
        status: &'static str,
    }

    impl TableDisplay for Row {
        fn headers() -> Vec<&'static str> {
            vec!["NAME", "STATUS"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.name.to_string(), self.status.to_string()]
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { name: "login-page", status: "passed" },
            Row { name: "run-sales-report", status: "failed" },
        ]
    }

    #[test]
    fn test_plain_separates_rows() {
        assert_eq!(
            render_list(&rows(), OutputFormat::Plain),
            "NAME: login-page\nSTATUS: passed\n---\nNAME: run-sales-report\nSTATUS: failed\n"
        );
    }

    #[test]
    fn test_json_item_is_an_object_and_list_an_array() {
        let item: serde_json::Value =
            serde_json::from_str(&render_item(&rows()[0], OutputFormat::Json)).unwrap();
        assert_eq!(item["status"], "passed");

        let list: serde_json::Value = serde_json::from_str(&render_list(&rows(), OutputFormat::Json)).unwrap();
        assert_eq!(list.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_list() {
        let empty: Vec<Row> = vec![];
        assert_eq!(render_list(&empty, OutputFormat::Table), "Nothing to show.\n");
        assert_eq!(render_list(&empty, OutputFormat::Json), "[]\n");
    }

    #[test]
    fn test_table_has_headers_and_cells() {
        let table = render_list(&rows(), OutputFormat::Table);
        assert!(table.contains("NAME"));
        assert!(table.contains("run-sales-report"));
    }
}
