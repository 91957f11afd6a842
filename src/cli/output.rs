use std::fmt::Write as FmtWrite;

use crate::models::{OutputFormat, QueryResults};

pub trait Formatter {
    fn format_query_results(&self, results: &QueryResults) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_load_stats(&self, stats: &LoadStats) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub driver: String,
    pub url: String,
    pub connected: bool,
    pub collection: String,
    pub vector_count: u64,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    pub documents: u64,
    pub skipped: u64,
    pub embedded: u64,
    pub uploaded: u64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
    pub duration_ms: u64,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_query_results(&self, results: &QueryResults) -> String {
        if results.is_empty() {
            return format!("No matches found for: {}\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "Matches for: \"{}\"", results.query).unwrap();
        writeln!(
            output,
            "Found {} matches in {}ms\n",
            results.total, results.duration_ms
        )
        .unwrap();

        for (i, m) in results.matches.iter().enumerate() {
            writeln!(output, "{}. [Score: {:.3}] {}", i + 1, m.score, m.id).unwrap();
            if let Some(ref title) = m.title
                && !title.is_empty()
            {
                writeln!(output, "   Title: {}", title).unwrap();
            }
            if let Some(ref text) = m.text {
                let preview: String = text.chars().take(200).collect();
                let preview = if text.chars().count() > 200 {
                    format!("{}...", preview)
                } else {
                    preview
                };
                for line in preview.lines() {
                    writeln!(output, "   {}", line).unwrap();
                }
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let connection = if status.connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(output, "Vector Store:  {} {}", status.driver, connection).unwrap();
        writeln!(output, "  URL:         {}", status.url).unwrap();
        writeln!(output, "  Collection:  {}", status.collection).unwrap();
        if let Some(ref namespace) = status.namespace {
            writeln!(output, "  Namespace:   {}", namespace).unwrap();
        }
        if status.connected {
            writeln!(output, "  Vectors:     {}", status.vector_count).unwrap();
        }

        output
    }

    fn format_load_stats(&self, stats: &LoadStats) -> String {
        let mut output = String::new();
        writeln!(output, "Load Complete").unwrap();
        writeln!(output, "-------------").unwrap();
        writeln!(output, "Documents:       {}", stats.documents).unwrap();
        if stats.skipped > 0 {
            writeln!(output, "Skipped:         {}", stats.skipped).unwrap();
        }
        writeln!(output, "Embedded:        {}", stats.embedded).unwrap();
        writeln!(output, "Uploaded:        {}", stats.uploaded).unwrap();
        writeln!(output, "Tokens:          {}", stats.total_tokens).unwrap();
        writeln!(output, "Est. cost:       ${:.4}", stats.estimated_cost_usd).unwrap();
        writeln!(output, "Duration:        {}ms", stats.duration_ms).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    fn emit(&self, value: &serde_json::Value) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

impl Formatter for JsonFormatter {
    fn format_query_results(&self, results: &QueryResults) -> String {
        let json = serde_json::json!({
            "query": results.query,
            "total": results.total,
            "duration_ms": results.duration_ms,
            "matches": results.matches,
        });
        self.emit(&json)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "driver": status.driver,
            "url": status.url,
            "connected": status.connected,
            "collection": status.collection,
            "namespace": status.namespace,
            "vector_count": status.vector_count,
        });
        self.emit(&json)
    }

    fn format_load_stats(&self, stats: &LoadStats) -> String {
        let json = serde_json::json!({
            "documents": stats.documents,
            "skipped": stats.skipped,
            "embedded": stats.embedded,
            "uploaded": stats.uploaded,
            "total_tokens": stats.total_tokens,
            "estimated_cost_usd": stats.estimated_cost_usd,
            "duration_ms": stats.duration_ms,
        });
        self.emit(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter { pretty: true }),
    }
}
