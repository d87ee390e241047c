//! Keyword-driven classification of what kind of answer a data question wants.

use serde::{Deserialize, Serialize};

use crate::text::{contains_any_phrase, normalize_text, tokenize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Maximum,
    Minimum,
    First,
    Last,
    Average,
    Trend,
    Comparison,
    Count,
    Outlier,
    Schema,
    General,
}

/// Checked in order; the first set with a matching cue wins.
const PRIORITY: &[(AnalysisType, &[&str])] = &[
    (AnalysisType::Maximum, &["highest", "max", "top", "largest"]),
    (AnalysisType::Minimum, &["lowest", "min", "bottom", "smallest"]),
    (AnalysisType::First, &["first", "earliest", "initial", "beginning"]),
    (AnalysisType::Last, &["last", "latest", "most recent", "newest"]),
    (AnalysisType::Average, &["average", "mean", "typical"]),
    (AnalysisType::Trend, &["trend", "pattern", "over time", "change"]),
    (AnalysisType::Comparison, &["compare", "difference", "versus", "vs"]),
    (AnalysisType::Count, &["count", "total", "sum", "how many"]),
    (AnalysisType::Outlier, &["outlier", "anomaly", "unusual", "abnormal"]),
    (AnalysisType::Schema, &["schema", "structure", "fields", "keys", "data types", "format"]),
];

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maximum => "maximum",
            Self::Minimum => "minimum",
            Self::First => "first",
            Self::Last => "last",
            Self::Average => "average",
            Self::Trend => "trend",
            Self::Comparison => "comparison",
            Self::Count => "count",
            Self::Outlier => "outlier",
            Self::Schema => "schema",
            Self::General => "general",
        }
    }

    /// Whether answering this kind of question needs every fetched document.
    pub fn needs_full_batch(&self) -> bool {
        matches!(self, Self::Average | Self::Trend | Self::Outlier)
    }

    /// Instruction appended to the analysis prompt so the answer targets the right aggregate.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Maximum => {
                "Identify the document(s) with the highest value for the field the user asks about and state that value."
            }
            Self::Minimum => {
                "Identify the document(s) with the lowest value for the field the user asks about and state that value."
            }
            Self::First => "Identify the earliest or first document in the data and describe it.",
            Self::Last => "Identify the latest or most recent document in the data and describe it.",
            Self::Average => {
                "Compute the average of the relevant numeric field across all provided documents."
            }
            Self::Trend => "Describe how the relevant values change across the documents in order.",
            Self::Comparison => "Compare the requested items and state the differences plainly.",
            Self::Count => "Count or total the relevant documents or values and state the number.",
            Self::Outlier => {
                "Identify values that deviate markedly from the rest of the data and explain why they stand out."
            }
            Self::Schema => {
                "Describe the structure of the data using the schema: field names, types, and which fields are required."
            }
            Self::General => "Answer the user's question directly using the provided data.",
        }
    }
}

/// Total and deterministic: every message maps to exactly one analysis type.
pub fn detect_analysis_type(message: &str) -> AnalysisType {
    let tokens = tokenize(&normalize_text(message));

    PRIORITY
        .iter()
        .find(|(_, cues)| contains_any_phrase(&tokens, cues))
        .map(|(analysis_type, _)| *analysis_type)
        .unwrap_or(AnalysisType::General)
}

#[cfg(test)]
mod tests {
    use super::{detect_analysis_type, AnalysisType};

    #[test]
    fn earlier_priority_wins_when_multiple_sets_match() {
        assert_eq!(
            detect_analysis_type("what is the average of the highest prices"),
            AnalysisType::Maximum
        );
    }

    #[test]
    fn multi_word_cues_are_detected() {
        assert_eq!(detect_analysis_type("show the most recent signups"), AnalysisType::Last);
        assert_eq!(detect_analysis_type("how did revenue move over time"), AnalysisType::Trend);
        assert_eq!(detect_analysis_type("how many orders shipped"), AnalysisType::Count);
        assert_eq!(detect_analysis_type("what data types are stored"), AnalysisType::Schema);
    }

    #[test]
    fn cues_match_word_prefixes() {
        assert_eq!(detect_analysis_type("what is the maximum price"), AnalysisType::Maximum);
        assert_eq!(detect_analysis_type("show the minimum order value"), AnalysisType::Minimum);
        assert_eq!(detect_analysis_type("what are the averages per region"), AnalysisType::Average);
        assert_eq!(detect_analysis_type("stop the top seller"), AnalysisType::Maximum);
    }

    #[test]
    fn cues_inside_words_do_not_match() {
        assert_eq!(detect_analysis_type("list the admin users"), AnalysisType::General);
        assert_eq!(detect_analysis_type("stop the import"), AnalysisType::General);
    }

    #[test]
    fn unmatched_messages_default_to_general() {
        assert_eq!(detect_analysis_type("show me some orders"), AnalysisType::General);
        assert_eq!(detect_analysis_type(""), AnalysisType::General);
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert_eq!(detect_analysis_type("Give me the AVERAGE price"), AnalysisType::Average);
        assert!(AnalysisType::Average.needs_full_batch());
        assert!(!AnalysisType::Count.needs_full_batch());
    }
}
