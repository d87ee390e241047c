//! Bounds the document batch handed to the generation step.
//!
//! Small batches pass through untouched. Large batches are cut to a head/tail window unless
//! the question (or its analysis type) needs every document.

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisType;
use crate::domain::document::Document;
use crate::text::{contains_any_phrase, normalize_text, tokenize};

/// Above this size the adapter starts deciding whether the full batch is needed.
pub const FULL_BATCH_CHECK_THRESHOLD: usize = 50;
/// Above this size an unneeded full batch is replaced by the sampling window.
pub const SAMPLING_THRESHOLD: usize = 100;
pub const WINDOW_HEAD: usize = 25;
pub const WINDOW_TAIL: usize = 25;

const FULL_DATA_CUES: &[&str] = &["all", "every", "each", "complete", "entire", "total"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterMetadata {
    /// Keys of the first document, in document order.
    pub fields: Vec<String>,
    pub total_documents: usize,
    pub returned_documents: usize,
    pub analysis_type: AnalysisType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdaptedBatch {
    pub documents: Vec<Document>,
    pub sampling_note: Option<String>,
    pub metadata: AdapterMetadata,
}

impl AdaptedBatch {
    pub fn is_sampled(&self) -> bool {
        self.sampling_note.is_some()
    }
}

pub fn requires_full_batch(message: &str, analysis_type: AnalysisType) -> bool {
    let tokens = tokenize(&normalize_text(message));
    contains_any_phrase(&tokens, FULL_DATA_CUES) || analysis_type.needs_full_batch()
}

/// Deterministic for identical inputs; never reorders the documents it keeps.
pub fn adapt_documents(
    documents: Vec<Document>,
    message: &str,
    analysis_type: AnalysisType,
) -> AdaptedBatch {
    let total_documents = documents.len();
    let fields =
        documents.first().map(|first| first.keys().cloned().collect()).unwrap_or_default();

    let should_sample = total_documents > FULL_BATCH_CHECK_THRESHOLD
        && total_documents > SAMPLING_THRESHOLD
        && !requires_full_batch(message, analysis_type);

    let (documents, sampling_note) = if should_sample {
        let note = format!(
            "Showing {} of {total_documents} documents (the first {WINDOW_HEAD} and the last {WINDOW_TAIL}) because the question does not require the complete data set.",
            WINDOW_HEAD + WINDOW_TAIL
        );
        (sample_window(documents), Some(note))
    } else {
        (documents, None)
    };

    AdaptedBatch {
        metadata: AdapterMetadata {
            fields,
            total_documents,
            returned_documents: documents.len(),
            analysis_type,
        },
        documents,
        sampling_note,
    }
}

fn sample_window(mut documents: Vec<Document>) -> Vec<Document> {
    let tail = documents.split_off(documents.len() - WINDOW_TAIL);
    documents.truncate(WINDOW_HEAD);
    documents.extend(tail);
    documents
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{adapt_documents, requires_full_batch};
    use crate::analysis::{detect_analysis_type, AnalysisType};
    use crate::domain::document::Document;

    fn batch(size: usize) -> Vec<Document> {
        (0..size)
            .map(|index| match json!({"seq": index, "price": index * 3}) {
                Value::Object(map) => map,
                _ => unreachable!("fixture is an object"),
            })
            .collect()
    }

    fn seq(document: &Document) -> u64 {
        document.get("seq").and_then(Value::as_u64).unwrap_or(u64::MAX)
    }

    #[test]
    fn average_question_keeps_full_batch() {
        let message = "give me the average price";
        let analysis_type = detect_analysis_type(message);
        assert_eq!(analysis_type, AnalysisType::Average);

        let adapted = adapt_documents(batch(150), message, analysis_type);
        assert_eq!(adapted.documents.len(), 150);
        assert!(adapted.sampling_note.is_none());
        assert_eq!(adapted.metadata.total_documents, 150);
    }

    #[test]
    fn casual_question_samples_head_and_tail() {
        let message = "show me some orders";
        let adapted = adapt_documents(batch(150), message, detect_analysis_type(message));

        assert_eq!(adapted.documents.len(), 50);
        let sequence = adapted.documents.iter().map(seq).collect::<Vec<_>>();
        let expected = (0..25).chain(125..150).collect::<Vec<u64>>();
        assert_eq!(sequence, expected);

        let note = adapted.sampling_note.expect("sampling note attached");
        assert!(note.contains("150"));
        assert_eq!(adapted.metadata.returned_documents, 50);
        assert_eq!(adapted.metadata.fields, vec!["price", "seq"]);
    }

    #[test]
    fn full_data_cue_prevents_sampling() {
        let adapted = adapt_documents(batch(150), "list every order", AnalysisType::General);
        assert_eq!(adapted.documents.len(), 150);
        assert!(requires_full_batch("show the entire table", AnalysisType::General));
        assert!(!requires_full_batch("show a smaller table", AnalysisType::General));
        assert!(requires_full_batch("show the totals by region", AnalysisType::General));
        let averages = "what are the averages per region";
        assert!(requires_full_batch(averages, detect_analysis_type(averages)));
    }

    #[test]
    fn mid_sized_batches_are_not_sampled() {
        let adapted = adapt_documents(batch(80), "show me some orders", AnalysisType::General);
        assert_eq!(adapted.documents.len(), 80);
        assert!(!adapted.is_sampled());
    }

    #[test]
    fn adaptation_is_deterministic() {
        let first = adapt_documents(batch(120), "show orders", AnalysisType::General);
        let second = adapt_documents(batch(120), "show orders", AnalysisType::General);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_batch_has_no_fields() {
        let adapted = adapt_documents(Vec::new(), "show orders", AnalysisType::Count);
        assert!(adapted.documents.is_empty());
        assert!(adapted.metadata.fields.is_empty());
        assert_eq!(adapted.metadata.analysis_type, AnalysisType::Count);
    }
}
