//! Market analysis report builder
//!
//! Builds the logical content of the advisory report: title, generation
//! timestamp, a market summary, a fixed recommendation list and a
//! disclaimer. Rendering to bytes and delivery are external concerns;
//! callers get back the structured document and a paginated text view.

use crate::models::{Quote, Sentiment};
use chrono::{DateTime, Utc};

const RECOMMENDATIONS: &[&str] = &[
    "Maintain diversified portfolio across sectors",
    "Monitor market volatility and adjust positions accordingly",
    "Consider defensive stocks during uncertain periods",
    "Review portfolio allocation quarterly",
    "Stay updated with economic indicators and policy changes",
];

const DISCLAIMER: &str = "This report is for informational purposes only. \
Consult a financial advisor before making investment decisions.";

#[derive(Debug, Clone)]
pub struct ReportSection {
    pub heading: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MarketReport {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<ReportSection>,
}

impl MarketReport {
    /// Build the report from an optional market snapshot. Without a
    /// snapshot the summary falls back to generic narrative text.
    pub fn build(snapshot: Option<&Quote>) -> Self {
        let generated_at = Utc::now();

        let summary_lines = match snapshot {
            Some(quote) => vec![
                format!(
                    "Nifty 50: {} ({:.2}%)",
                    quote.price, quote.change_percentage
                ),
                format!("Volume: {}", quote.volume),
                format!(
                    "Sentiment: {}",
                    Sentiment::from_change_pct(quote.change_percentage)
                ),
                format!("Source: {}", quote.source),
            ],
            None => vec![
                "Market data analysis based on current conditions and trends.".to_string(),
            ],
        };

        let sections = vec![
            ReportSection {
                heading: "Market Summary".to_string(),
                lines: summary_lines,
            },
            ReportSection {
                heading: "Key Recommendations".to_string(),
                lines: RECOMMENDATIONS
                    .iter()
                    .enumerate()
                    .map(|(i, rec)| format!("{}. {}", i + 1, rec))
                    .collect(),
            },
            ReportSection {
                heading: "Disclaimer".to_string(),
                lines: vec![DISCLAIMER.to_string()],
            },
        ];

        Self {
            title: "Market Analysis Report".to_string(),
            generated_at,
            sections,
        }
    }

    /// Render the document as pages of at most `lines_per_page` lines.
    /// Always yields at least one page.
    pub fn render_pages(&self, lines_per_page: usize) -> Vec<String> {
        let mut lines = vec![
            self.title.clone(),
            format!("Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S")),
            String::new(),
        ];

        for section in &self.sections {
            lines.push(section.heading.clone());
            lines.extend(section.lines.iter().cloned());
            lines.push(String::new());
        }

        let per_page = lines_per_page.max(1);
        lines
            .chunks(per_page)
            .map(|chunk| chunk.join("\n"))
            .collect()
    }
}
