//! `/local` delegation directive extraction.

/// Marker Senior writes to hand a task to Junior.
pub const DELEGATION_MARKER: &str = "/local";

/// Return the task text of the last `/local` directive in `text`.
///
/// The marker matches case-insensitively and must be followed by whitespace.
/// Everything after the last such marker, trimmed, is the task. Returns `None`
/// when there is no marker or the task is empty.
///
/// ```
/// use weaver_rs::parser::extract_delegation;
///
/// assert_eq!(extract_delegation("Sure.\n/local write fizzbuzz").as_deref(), Some("write fizzbuzz"));
/// assert_eq!(extract_delegation("/local A\n/local B").as_deref(), Some("B"));
/// assert_eq!(extract_delegation("see http://localhost"), None);
/// ```
pub fn extract_delegation(text: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lowered = text.to_ascii_lowercase();
    let task_start = lowered
        .match_indices(DELEGATION_MARKER)
        .map(|(i, _)| i + DELEGATION_MARKER.len())
        .filter(|&end| {
            lowered
                .get(end..)
                .and_then(|rest| rest.chars().next())
                .is_some_and(char::is_whitespace)
        })
        .last()?;

    let task = text.get(task_start..)?.trim();
    (!task.is_empty()).then(|| task.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_reply_has_no_directive() {
        assert_eq!(extract_delegation("Here is the answer: 42."), None);
        assert_eq!(extract_delegation(""), None);
    }

    #[test]
    fn directive_at_end_of_reply() {
        let reply = "I'll have Junior handle this.\n\n/local Write a Python fizzbuzz function";
        assert_eq!(
            extract_delegation(reply).as_deref(),
            Some("Write a Python fizzbuzz function")
        );
    }

    #[test]
    fn task_spans_multiple_lines() {
        let reply = "/local Write tests.\nCover edge cases.\n";
        assert_eq!(
            extract_delegation(reply).as_deref(),
            Some("Write tests.\nCover edge cases.")
        );
    }

    #[test]
    fn case_insensitive_marker() {
        assert_eq!(extract_delegation("/LOCAL do it").as_deref(), Some("do it"));
        assert_eq!(extract_delegation("/Local\tdo it").as_deref(), Some("do it"));
    }

    #[test]
    fn last_marker_wins() {
        assert_eq!(extract_delegation("/local A\n/local B").as_deref(), Some("B"));
    }

    #[test]
    fn marker_needs_whitespace_and_task() {
        assert_eq!(extract_delegation("ends with /local"), None);
        assert_eq!(extract_delegation("ends with /local   \n"), None);
        assert_eq!(extract_delegation("/localhost:8080 is up"), None);
    }

    #[test]
    fn earlier_valid_marker_used_when_later_is_not_a_directive() {
        let reply = "/local fix the bug in /localhost handling";
        assert_eq!(
            extract_delegation(reply).as_deref(),
            Some("fix the bug in /localhost handling")
        );
    }

    #[test]
    fn non_ascii_text_is_preserved() {
        let reply = "Ünïcode intro\n/local résumé parser";
        assert_eq!(extract_delegation(reply).as_deref(), Some("résumé parser"));
    }
}
