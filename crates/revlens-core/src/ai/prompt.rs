//! Review prompt builder.
//!
//! Assembles system prompts from a session snapshot using XML tag
//! boundaries so the model can tell PR metadata, diffs, reviewer comments
//! and repository guidance apart.
//!
//! Layout (chat):
//! ```text
//! <change_request>Title / Author / State / Description</change_request>
//! <target_file path="...">diff + full content</target_file>
//! <all_changes>every file's diff</all_changes>
//! <review_comments>...</review_comments>
//! <repository_instructions>...</repository_instructions>
//! <readme>...</readme>
//! <instructions>...</instructions>
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;

use revlens_types::llm::Locale;
use revlens_types::session::{FileChange, ReviewComment, SessionSnapshot};

/// Upper bound for one section's body, in characters.
pub const MAX_SECTION_CHARS: usize = 60_000;

pub struct ReviewPromptBuilder;

impl ReviewPromptBuilder {
    /// System prompt for per-file checklist generation.
    pub fn checklist(snapshot: &SessionSnapshot, file: &FileChange, locale: Locale) -> String {
        let mut sections = Vec::with_capacity(6);
        sections.push(Self::change_request_section(snapshot, false));
        sections.push(Self::target_file_section(file));
        Self::push_guidance(&mut sections, snapshot);
        sections.push(format!(
            "<instructions>\n\
            You are an experienced code reviewer.\n\
            Explain what the change to `{path}` does and why it matters, then list \
            concrete, verifiable review checks for this file.\n\
            Each checklist item needs a short unique id and a one-sentence description. \
            Every item starts unchecked.\n\
            Set `filename` to `{path}`.\n\
            Write the explanation and descriptions in {language}.\n\
            </instructions>",
            path = file.path,
            language = locale.language_name(),
        ));
        sections.join("\n\n")
    }

    /// User message that triggers checklist generation.
    pub fn checklist_request(file_path: &str) -> String {
        format!("Generate the review checklist for `{file_path}`.")
    }

    /// System prompt for a per-file discussion.
    pub fn chat(snapshot: &SessionSnapshot, file: &FileChange, locale: Locale) -> String {
        let mut sections = Vec::with_capacity(7);
        sections.push(Self::change_request_section(snapshot, false));
        sections.push(Self::target_file_section(file));
        sections.push(Self::all_changes_section(&snapshot.files));
        if let Some(comments) = Self::review_comments_section(&snapshot.review_comments) {
            sections.push(comments);
        }
        Self::push_guidance(&mut sections, snapshot);
        sections.push(format!(
            "<instructions>\n\
            You are helping a reviewer understand `{path}` in this change request.\n\
            Use the other changed files only as context for this file.\n\
            Quote code from the diff when it helps. Say so when the diff does not \
            contain enough information to answer.\n\
            Answer in {language}.\n\
            </instructions>",
            path = file.path,
            language = locale.language_name(),
        ));
        sections.join("\n\n")
    }

    /// System prompt for the whole-change summary.
    pub fn summary(snapshot: &SessionSnapshot, locale: Locale) -> String {
        let mut sections = Vec::with_capacity(6);
        sections.push(Self::change_request_section(snapshot, true));
        sections.push(Self::all_changes_section(&snapshot.files));
        if let Some(activity) = Self::review_activity_section(&snapshot.review_comments) {
            sections.push(activity);
        }
        Self::push_guidance(&mut sections, snapshot);
        sections.push(format!(
            "<instructions>\n\
            Summarize this change request for a reviewer using exactly these five \
            headed parts, in order:\n\
            1. Background\n\
            2. Problem\n\
            3. Solution\n\
            4. Implementation\n\
            5. Review activity: a timeline grouped by day, oldest first, using the \
            review activity above. Write \"No review activity\" when there is none.\n\
            Write in {language}.\n\
            </instructions>",
            language = locale.language_name(),
        ));
        sections.join("\n\n")
    }

    /// User message that triggers the summary.
    pub fn summary_request() -> String {
        "Summarize this change request.".to_string()
    }

    fn change_request_section(snapshot: &SessionSnapshot, with_state: bool) -> String {
        let mut body = format!(
            "Title: {}\nAuthor: {}\nURL: {}",
            snapshot.title, snapshot.author, snapshot.identifier
        );
        if with_state {
            body.push_str(&format!("\nState: {}", snapshot.state));
        }
        if !snapshot.description.trim().is_empty() {
            body.push_str("\n\nDescription:\n");
            body.push_str(snapshot.description.trim());
        }
        format!("<change_request>\n{}\n</change_request>", truncate_section(&body))
    }

    fn target_file_section(file: &FileChange) -> String {
        let mut body = format!("<diff>\n{}\n</diff>", truncate_section(&file.diff));
        if let Some(content) = &file.content {
            body.push_str(&format!(
                "\n<file_content>\n{}\n</file_content>",
                truncate_section(content)
            ));
        }
        format!("<target_file path=\"{}\">\n{body}\n</target_file>", file.path)
    }

    fn all_changes_section(files: &[FileChange]) -> String {
        let combined: Vec<String> = files
            .iter()
            .map(|f| format!("--- {} ({:?}, +{} -{})\n{}", f.path, f.status, f.additions, f.deletions, f.diff))
            .collect();
        format!(
            "<all_changes>\n{}\n</all_changes>",
            truncate_section(&combined.join("\n\n"))
        )
    }

    fn review_comments_section(comments: &[ReviewComment]) -> Option<String> {
        if comments.is_empty() {
            return None;
        }
        let lines: Vec<String> = comments.iter().map(format_comment).collect();
        Some(format!(
            "<review_comments>\n{}\n</review_comments>",
            truncate_section(&lines.join("\n"))
        ))
    }

    /// Reviewer comments bucketed by calendar day (UTC), oldest first.
    fn review_activity_section(comments: &[ReviewComment]) -> Option<String> {
        if comments.is_empty() {
            return None;
        }
        let mut days: BTreeMap<NaiveDate, Vec<&ReviewComment>> = BTreeMap::new();
        for comment in comments {
            days.entry(comment.created_at.date_naive()).or_default().push(comment);
        }

        let mut body = String::new();
        for (day, mut entries) in days {
            entries.sort_by_key(|c| c.created_at);
            body.push_str(&format!("## {day}\n"));
            for comment in entries {
                body.push_str(&format_comment(comment));
                body.push('\n');
            }
        }
        Some(format!(
            "<review_activity>\n{}\n</review_activity>",
            truncate_section(body.trim_end())
        ))
    }

    fn push_guidance(sections: &mut Vec<String>, snapshot: &SessionSnapshot) {
        if let Some(instructions) = snapshot.instructions.as_deref().filter(|s| !s.trim().is_empty()) {
            sections.push(format!(
                "<repository_instructions>\n{}\n</repository_instructions>",
                truncate_section(instructions.trim())
            ));
        }
        if let Some(readme) = snapshot.readme.as_deref().filter(|s| !s.trim().is_empty()) {
            sections.push(format!("<readme>\n{}\n</readme>", truncate_section(readme.trim())));
        }
    }
}

fn format_comment(comment: &ReviewComment) -> String {
    let location = comment
        .path
        .as_deref()
        .map(|p| format!(" on {p}"))
        .unwrap_or_default();
    format!(
        "- [{}] {}{location}: {}",
        comment.created_at.format("%Y-%m-%d %H:%M"),
        comment.author,
        comment.body.trim()
    )
}

/// Cut `text` to [`MAX_SECTION_CHARS`] on a char boundary.
pub fn truncate_section(text: &str) -> String {
    match text.char_indices().nth(MAX_SECTION_CHARS) {
        Some((idx, _)) => format!("{}\n[truncated]", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use revlens_types::session::{ChangeState, FileStatus, HostKind, SessionIdentifier};

    fn file(path: &str, diff: &str) -> FileChange {
        FileChange {
            path: path.to_string(),
            status: FileStatus::Modified,
            diff: diff.to_string(),
            content: Some(format!("// full {path}")),
            additions: 3,
            deletions: 1,
        }
    }

    fn comment(author: &str, day: u32, hour: u32, body: &str) -> ReviewComment {
        ReviewComment {
            author: author.to_string(),
            body: body.to_string(),
            path: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap(),
        }
    }

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            identifier: SessionIdentifier {
                kind: HostKind::GitHub,
                host: "github.com".to_string(),
                owner: "acme".to_string(),
                repo: "widgets".to_string(),
                number: 42,
            },
            title: "Bound retry backoff".to_string(),
            description: "Caps the exponential backoff.".to_string(),
            author: "octocat".to_string(),
            state: ChangeState::Merged,
            files: vec![file("src/retry.rs", "+cap"), file("src/lib.rs", "+mod retry;")],
            review_comments: vec![
                comment("bob", 2, 9, "LGTM"),
                comment("alice", 1, 15, "What is the cap?"),
                comment("alice", 1, 10, "Looking now"),
            ],
            instructions: Some("Prefer small functions.".to_string()),
            readme: None,
        }
    }

    #[test]
    fn test_chat_prompt_sections() {
        let snap = snapshot();
        let prompt = ReviewPromptBuilder::chat(&snap, &snap.files[0], Locale::En);

        assert!(prompt.contains("<change_request>"));
        assert!(prompt.contains("Bound retry backoff"));
        assert!(prompt.contains("<target_file path=\"src/retry.rs\">"));
        assert!(prompt.contains("<file_content>\n// full src/retry.rs"));
        assert!(prompt.contains("<all_changes>"));
        assert!(prompt.contains("+mod retry;"));
        assert!(prompt.contains("<review_comments>"));
        assert!(prompt.contains("<repository_instructions>\nPrefer small functions."));
        assert!(!prompt.contains("<readme>"));
        assert!(prompt.contains("Answer in English."));
    }

    #[test]
    fn test_checklist_prompt_names_file_and_locale() {
        let snap = snapshot();
        let prompt = ReviewPromptBuilder::checklist(&snap, &snap.files[1], Locale::Ja);
        assert!(prompt.contains("Set `filename` to `src/lib.rs`"));
        assert!(prompt.contains("Japanese"));
        assert!(!prompt.contains("<all_changes>"));
    }

    #[test]
    fn test_summary_buckets_activity_by_day() {
        let snap = snapshot();
        let prompt = ReviewPromptBuilder::summary(&snap, Locale::En);

        assert!(prompt.contains("State: merged"));
        assert!(prompt.contains("5. Review activity"));
        let first_day = prompt.find("## 2024-05-01").unwrap();
        let second_day = prompt.find("## 2024-05-02").unwrap();
        assert!(first_day < second_day);
        let looking = prompt.find("Looking now").unwrap();
        let question = prompt.find("What is the cap?").unwrap();
        assert!(looking < question && question < second_day);
    }

    #[test]
    fn test_summary_without_comments_has_no_activity_section() {
        let mut snap = snapshot();
        snap.review_comments.clear();
        let prompt = ReviewPromptBuilder::summary(&snap, Locale::En);
        assert!(!prompt.contains("<review_activity>"));
    }

    #[test]
    fn test_truncate_section_respects_char_boundaries() {
        let long = "é".repeat(MAX_SECTION_CHARS + 5);
        let cut = truncate_section(&long);
        assert!(cut.ends_with("[truncated]"));
        assert_eq!(cut.chars().filter(|c| *c == 'é').count(), MAX_SECTION_CHARS);

        assert_eq!(truncate_section("short"), "short");
    }
}
