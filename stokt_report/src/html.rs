//! HTML fragments appended to the hand-written `report.html`.

use std::fmt::Write;

use v_htmlescape::escape;

use crate::popularity::GradePopularity;
use crate::similarity::SimilarityMessage;
use crate::StoktError;

const SIMILARITY_MARKER: &str = "Similarity";

pub fn similarity_section(messages: &[SimilarityMessage]) -> String {
    let mut out = String::from("<h2>Route Similarity</h2><ul>");
    for message in messages {
        let _ = write!(out, "<li>{}</li>", escape(&message.text));
    }
    out.push_str("</ul>");
    out
}

pub fn popularity_section(grades: &[GradePopularity]) -> String {
    let mut out = String::from("<h2>Popular Holds by Grade</h2><ul>");
    for grade in grades {
        let holds = grade
            .holds
            .iter()
            .map(|(id, n)| format!("{id} ({n})"))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(
            out,
            "<li>{} ({} routes): {}</li>",
            escape(&grade.grade),
            grade.route_count,
            holds
        );
    }
    out.push_str("</ul>");
    out
}

/// Whether a report can still take a similarity section.
pub fn check_report(existing: &str) -> Result<(), StoktError> {
    if existing.contains(SIMILARITY_MARKER) {
        Err(StoktError::ReportAlreadyContainsSimilarity)
    } else {
        Ok(())
    }
}

/// Append the similarity list and close the document. The report is expected
/// to be left open (no closing `</body></html>`) by whoever wrote its head.
pub fn append_similarity(
    existing: &str,
    messages: &[SimilarityMessage],
) -> Result<String, StoktError> {
    check_report(existing)?;
    let mut out = String::with_capacity(existing.len() + 64 * messages.len());
    out.push_str(existing);
    out.push_str(&similarity_section(messages));
    out.push_str("</body></html>");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(d: usize, text: &str) -> SimilarityMessage {
        SimilarityMessage {
            distance: d,
            route_id: "a".into(),
            neighbor_id: "b".into(),
            text: text.into(),
        }
    }

    #[test]
    fn appends_escaped_list() {
        let out = append_similarity(
            "<html><body><h1>Wall</h1>",
            &[message(1, "A&B (V1) is most hold-similar to <C> (V2)")],
        )
        .unwrap();
        assert_eq!(
            out,
            "<html><body><h1>Wall</h1><h2>Route Similarity</h2><ul>\
             <li>A&amp;B (V1) is most hold-similar to &lt;C&gt; (V2)</li></ul></body></html>"
        );
    }

    #[test]
    fn refuses_second_similarity_section() {
        let once = append_similarity("<html><body>", &[]).unwrap();
        assert_eq!(
            append_similarity(&once, &[]).unwrap_err(),
            StoktError::ReportAlreadyContainsSimilarity
        );
    }

    #[test]
    fn popularity_lists_counts() {
        let section = popularity_section(&[GradePopularity {
            grade: "V3".into(),
            route_count: 4,
            holds: vec![(12, 3), (7, 2)],
        }]);
        assert_eq!(
            section,
            "<h2>Popular Holds by Grade</h2><ul><li>V3 (4 routes): 12 (3), 7 (2)</li></ul>"
        );
    }
}
