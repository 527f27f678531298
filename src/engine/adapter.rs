//! Normalizes raw engine output into a scored [`ExtractionResult`].
//!
//! Confidence formulas are published per engine family so operators can
//! reason about why one engine won:
//!
//! - rule-based text:  `text_quality * page_coverage * char_adequacy`
//! - table-aware:      `(text_quality*0.3 + table_confidence*0.7) * page_coverage * char_adequacy`
//! - layout model:     `avg_token_confidence*0.7 + text_quality*0.3`
//! - OCR word-level:   `avg_token_confidence*0.8 + text_quality*0.2`

use crate::config::EngineConfig;
use crate::error::Result;
use crate::schema::{EngineFamily, ExtractionResult, TableBlock};
use log::debug;

use super::RawEngineOutput;

/// Weight on text_quality's sentence-coherence component when tables are
/// also present (tabular text is not prose, so coherence counts for less).
const COHERENCE_WEIGHT_WITH_TABLES: f64 = 0.2;
const COHERENCE_WEIGHT_TEXT_ONLY: f64 = 0.3;

/// Converts one engine invocation outcome into an `ExtractionResult`.
/// Engine errors become zero-confidence results; they never abort the run.
pub fn normalize(
    engine: &str,
    family: EngineFamily,
    outcome: Result<RawEngineOutput>,
    config: &EngineConfig,
) -> ExtractionResult {
    let raw = match outcome {
        Ok(raw) => raw,
        Err(e) => {
            debug!("engine {} failed: {}", engine, e);
            return ExtractionResult::failed(engine, family, e.to_string());
        }
    };

    let confidence = score(&raw, family, config);

    ExtractionResult {
        engine: engine.to_string(),
        family,
        text: raw.text,
        tables: raw.tables,
        confidence,
        processing_time_ms: raw.processing_time_ms,
        page_count: raw.page_count,
        error: None,
    }
}

fn score(raw: &RawEngineOutput, family: EngineFamily, config: &EngineConfig) -> f64 {
    let quality = text_quality(&raw.text, !raw.tables.is_empty());
    let coverage = page_coverage(raw, config);
    let adequacy = char_adequacy(&raw.text, config);

    let confidence = match family {
        EngineFamily::RuleBasedText => quality * coverage * adequacy,
        EngineFamily::TableAware => {
            if raw.tables.is_empty() {
                quality * coverage * adequacy
            } else {
                let table = table_confidence(&raw.tables, config);
                (quality * 0.3 + table * 0.7) * coverage * adequacy
            }
        }
        EngineFamily::LayoutModel => {
            token_blend(raw, quality, 0.7, 0.3) * adequacy
        }
        EngineFamily::OcrWordConfidence => {
            token_blend(raw, quality, 0.8, 0.2) * adequacy
        }
    };

    confidence.clamp(0.0, 1.0)
}

/// Blends length, alphanumeric ratio, and line coherence into [0, 1].
fn text_quality(text: &str, has_tables: bool) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let length_score = (trimmed.len() as f64 / 2000.0).min(1.0);

    let printable: Vec<char> = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    let alnum = printable.iter().filter(|c| c.is_alphanumeric()).count();
    let alnum_ratio = if printable.is_empty() {
        0.0
    } else {
        alnum as f64 / printable.len() as f64
    };

    let lines: Vec<&str> = trimmed.lines().filter(|l| !l.trim().is_empty()).collect();
    let coherent = lines
        .iter()
        .filter(|l| l.split_whitespace().count() >= 2)
        .count();
    let coherence = if lines.is_empty() {
        0.0
    } else {
        coherent as f64 / lines.len() as f64
    };

    let coherence_weight = if has_tables {
        COHERENCE_WEIGHT_WITH_TABLES
    } else {
        COHERENCE_WEIGHT_TEXT_ONLY
    };
    let alnum_weight = 0.7 - coherence_weight;

    length_score * 0.3 + alnum_ratio * alnum_weight + coherence * coherence_weight
}

/// Observed characters per page against the expected density.
fn page_coverage(raw: &RawEngineOutput, config: &EngineConfig) -> f64 {
    let pages = raw.page_count.max(1) as f64;
    let chars_per_page = raw.text.len() as f64 / pages;
    (chars_per_page / config.expected_chars_per_page).min(1.0)
}

/// Step function: a result with fewer than `min_chars` extracted characters
/// carries no signal at all.
fn char_adequacy(text: &str, config: &EngineConfig) -> f64 {
    if text.trim().len() >= config.min_chars {
        1.0
    } else {
        0.0
    }
}

/// Rewards header presence, non-empty cells, and column-count match.
fn table_confidence(tables: &[TableBlock], config: &EngineConfig) -> f64 {
    let with_headers = tables
        .iter()
        .filter(|t| t.headers.iter().any(|h| !h.trim().is_empty()))
        .count();
    let header_score = with_headers as f64 / tables.len() as f64;

    let mut cells = 0usize;
    let mut filled = 0usize;
    let mut matching_columns = 0usize;
    let mut total_rows = 0usize;
    for table in tables {
        for row in &table.rows {
            total_rows += 1;
            if row.len() == config.expected_table_columns {
                matching_columns += 1;
            }
            cells += row.len();
            filled += row.iter().filter(|c| !c.trim().is_empty()).count();
        }
    }
    let fill_score = if cells == 0 {
        0.0
    } else {
        filled as f64 / cells as f64
    };
    let column_score = if total_rows == 0 {
        0.0
    } else {
        matching_columns as f64 / total_rows as f64
    };

    header_score * 0.3 + fill_score * 0.4 + column_score * 0.3
}

fn token_blend(raw: &RawEngineOutput, quality: f64, token_weight: f64, text_weight: f64) -> f64 {
    if raw.tokens.is_empty() {
        // No per-token signal reported; fall back to text quality alone.
        return quality;
    }
    let avg = raw.tokens.iter().map(|t| t.confidence).sum::<f64>() / raw.tokens.len() as f64;
    avg * token_weight + quality * text_weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::schema::TokenSpan;

    fn statement_text() -> String {
        let mut text = String::from("Balance Sheet\nAs of December 31, 2023\n\n");
        for i in 0..40 {
            text.push_str(&format!("0{:03}-0000  Account Line {}  1,234.56\n", i, i));
        }
        text
    }

    fn raw_text_output(text: &str, pages: u32) -> RawEngineOutput {
        RawEngineOutput {
            text: text.to_string(),
            tables: Vec::new(),
            tokens: Vec::new(),
            page_count: pages,
            processing_time_ms: 10,
        }
    }

    #[test]
    fn test_engine_error_becomes_zero_confidence() {
        let result = normalize(
            "pdf_text",
            EngineFamily::RuleBasedText,
            Err(PipelineError::EngineFailure {
                engine: "pdf_text".to_string(),
                reason: "corrupt xref".to_string(),
            }),
            &EngineConfig::default(),
        );
        assert_eq!(result.confidence, 0.0);
        assert!(result.error.is_some());
        assert!(!result.is_usable());
    }

    #[test]
    fn test_short_text_fails_adequacy_step() {
        let result = normalize(
            "pdf_text",
            EngineFamily::RuleBasedText,
            Ok(raw_text_output("Cash 100.00", 1)),
            &EngineConfig::default(),
        );
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_dense_single_page_scores_high() {
        let result = normalize(
            "pdf_text",
            EngineFamily::RuleBasedText,
            Ok(raw_text_output(&statement_text(), 1)),
            &EngineConfig::default(),
        );
        assert!(result.confidence > 0.5, "got {}", result.confidence);
        assert!(result.is_usable());
    }

    #[test]
    fn test_sparse_pages_reduce_coverage() {
        let dense = normalize(
            "pdf_text",
            EngineFamily::RuleBasedText,
            Ok(raw_text_output(&statement_text(), 1)),
            &EngineConfig::default(),
        );
        let sparse = normalize(
            "pdf_text",
            EngineFamily::RuleBasedText,
            Ok(raw_text_output(&statement_text(), 10)),
            &EngineConfig::default(),
        );
        assert!(sparse.confidence < dense.confidence);
    }

    #[test]
    fn test_table_blend_rewards_well_formed_tables() {
        let table = TableBlock {
            headers: vec!["Code".into(), "Account".into(), "Amount".into()],
            rows: (0..20)
                .map(|i| {
                    vec![
                        format!("0{:03}-0000", i),
                        format!("Account {}", i),
                        "1,234.56".to_string(),
                    ]
                })
                .collect(),
        };
        let mut raw = raw_text_output(&statement_text(), 1);
        raw.tables = vec![table];

        let with_tables = normalize(
            "table_engine",
            EngineFamily::TableAware,
            Ok(raw),
            &EngineConfig::default(),
        );
        let text_only = normalize(
            "table_engine",
            EngineFamily::TableAware,
            Ok(raw_text_output(&statement_text(), 1)),
            &EngineConfig::default(),
        );
        assert!(with_tables.confidence > text_only.confidence);
    }

    #[test]
    fn test_token_confidence_blend() {
        let mut raw = raw_text_output(&statement_text(), 1);
        raw.tokens = vec![
            TokenSpan { text: "Cash".into(), confidence: 0.9 },
            TokenSpan { text: "100.00".into(), confidence: 0.7 },
        ];
        let result = normalize(
            "ocr",
            EngineFamily::OcrWordConfidence,
            Ok(raw),
            &EngineConfig::default(),
        );
        // avg token confidence 0.8 dominates at weight 0.8
        assert!(result.confidence > 0.6);
        assert!(result.confidence < 1.0);
    }
}
