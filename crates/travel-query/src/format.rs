//! Answer formatting.

use travel_core::{CandidateDocument, DocumentContent, LandmarkFields};

/// Reply when retrieval found nothing.
pub const NOT_FOUND_MESSAGE: &str =
    "I couldn't find any information related to your question. Could you try asking in a different way?";

/// First line of every non-empty answer.
pub const ANSWER_HEADER: &str = "Here's what I found regarding your question:";

const UNKNOWN_LANDMARK: &str = "Unknown Landmark";

/// Render candidates as a numbered answer, or the not-found message.
///
/// Ordinal `n` always refers to `documents[n - 1]`. Absent fields are left
/// out and descriptions are never shortened.
pub fn format_answer(documents: &[CandidateDocument]) -> String {
    if documents.is_empty() {
        return NOT_FOUND_MESSAGE.to_string();
    }

    let blocks: Vec<String> = documents
        .iter()
        .enumerate()
        .map(|(i, document)| format_document(i + 1, document))
        .collect();

    format!("{}\n\n{}\n", ANSWER_HEADER, blocks.join("\n\n"))
}

fn format_document(ordinal: usize, document: &CandidateDocument) -> String {
    let mut lines = match &document.content {
        DocumentContent::Fields(fields) => field_lines(ordinal, fields),
        DocumentContent::Raw(text) => vec![format!("#{} {}", ordinal, text)],
    };
    lines.push(format!("Source: {}", document.provenance));
    lines.join("\n")
}

fn field_lines(ordinal: usize, fields: &LandmarkFields) -> Vec<String> {
    let name = fields.name.as_deref().unwrap_or(UNKNOWN_LANDMARK);
    let mut lines = vec![format!("#{} {}", ordinal, name)];

    if let Some(location) = fields.location() {
        lines.push(format!("Location: {}", location));
    }
    if let Some(category) = &fields.category {
        lines.push(format!("Category: {}", category));
    }
    if let Some(activity) = &fields.activity {
        lines.push(format!("Activity: {}", activity));
    }
    if let Some(content) = &fields.content {
        lines.push(format!("Description: {}", content));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use travel_core::Provenance;

    fn named(id: &str, name: &str, provenance: Provenance) -> CandidateDocument {
        CandidateDocument::new(
            id,
            LandmarkFields {
                name: Some(name.to_string()),
                ..Default::default()
            },
            provenance,
            0.5,
        )
    }

    #[test]
    fn test_empty_is_not_found_message() {
        assert_eq!(
            format_answer(&[]),
            "I couldn't find any information related to your question. Could you try asking in a different way?"
        );
    }

    #[test]
    fn test_name_only_document() {
        let text = format_answer(&[named("landmark_1", "Eiffel Tower", Provenance::Vector)]);

        assert!(text.starts_with(ANSWER_HEADER));
        assert!(text.contains("#1 Eiffel Tower"));
        assert!(text.contains("Source: vector search"));
        assert!(!text.contains("Location:"));
        assert!(!text.contains("Category:"));
    }

    #[test]
    fn test_full_document_block() {
        let document = CandidateDocument::new(
            "landmark_16079",
            LandmarkFields {
                name: Some("Louvre".to_string()),
                content: Some("The world's largest art museum.".to_string()),
                country: Some("France".to_string()),
                city: Some("Paris".to_string()),
                category: Some("landmark".to_string()),
                activity: Some("see".to_string()),
                title: None,
            },
            Provenance::Keyword,
            1.2,
        );

        assert_eq!(
            format_answer(&[document]),
            "Here's what I found regarding your question:\n\n\
             #1 Louvre\n\
             Location: Paris, France\n\
             Category: landmark\n\
             Activity: see\n\
             Description: The world's largest art museum.\n\
             Source: keyword search\n"
        );
    }

    #[test]
    fn test_location_uses_present_parts_only() {
        let document = CandidateDocument::new(
            "landmark_2",
            LandmarkFields {
                country: Some("Japan".to_string()),
                ..Default::default()
            },
            Provenance::Vector,
            0.9,
        );
        let text = format_answer(&[document]);

        assert!(text.contains("#1 Unknown Landmark"));
        assert!(text.contains("Location: Japan\n"));
    }

    #[test]
    fn test_raw_content_is_rendered_literally() {
        let document = CandidateDocument {
            id: "landmark_3".to_string(),
            content: DocumentContent::Raw("not { json".to_string()),
            provenance: Provenance::Keyword,
            score: 0.0,
        };
        let text = format_answer(&[document]);

        assert!(text.contains("#1 not { json\nSource: keyword search"));
    }

    #[test]
    fn test_long_description_is_not_truncated() {
        let description = "x".repeat(5000);
        let document = CandidateDocument::new(
            "landmark_4",
            LandmarkFields {
                content: Some(description.clone()),
                ..Default::default()
            },
            Provenance::Vector,
            0.1,
        );

        assert!(format_answer(&[document]).contains(&description));
    }

    #[test]
    fn test_ordinals_follow_input_order() {
        let documents = vec![
            named("landmark_1", "First", Provenance::Vector),
            named("landmark_42", "Second", Provenance::Keyword),
            named("landmark_7", "Third", Provenance::Keyword),
            named("landmark_8", "Fourth", Provenance::Keyword),
        ];
        let text = format_answer(&documents);

        assert!(text.contains("#2 Second\nSource: keyword search"));
        // No cap on the number of rendered documents.
        assert!(text.contains("#4 Fourth"));
    }
}
