use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

/// Line diff between two versions of one object, rendered as pretty JSON.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectDiff {
    pub reference: String,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
    pub diff_lines: Vec<DiffLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffLine {
    pub line_type: DiffLineType,
    pub content: String,
    pub old_line_number: Option<usize>,
    pub new_line_number: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineType {
    Context,
    Addition,
    Deletion,
}

impl ObjectDiff {
    /// `None` on either side means the object did not exist there.
    pub fn from_values(reference: &str, old: Option<&Value>, new: Option<&Value>) -> Result<Self> {
        let render = |value: Option<&Value>| -> Result<Option<String>> {
            value
                .map(|v| serde_json::to_string_pretty(v).map(|s| s + "\n"))
                .transpose()
                .map_err(Into::into)
        };
        Ok(Self::from_text(reference, render(old)?, render(new)?))
    }

    pub fn from_text(reference: &str, old: Option<String>, new: Option<String>) -> Self {
        let diff_lines = Self::compute_diff(
            old.as_deref().unwrap_or_default(),
            new.as_deref().unwrap_or_default(),
        );
        ObjectDiff {
            reference: reference.to_string(),
            old_content: old,
            new_content: new,
            diff_lines,
        }
    }

    fn compute_diff(old_text: &str, new_text: &str) -> Vec<DiffLine> {
        let diff = TextDiff::from_lines(old_text, new_text);
        let mut lines = Vec::new();
        let mut old_line_num = 1;
        let mut new_line_num = 1;

        for change in diff.iter_all_changes() {
            let (line_type, old_num, new_num) = match change.tag() {
                ChangeTag::Delete => {
                    let num = old_line_num;
                    old_line_num += 1;
                    (DiffLineType::Deletion, Some(num), None)
                }
                ChangeTag::Insert => {
                    let num = new_line_num;
                    new_line_num += 1;
                    (DiffLineType::Addition, None, Some(num))
                }
                ChangeTag::Equal => {
                    let nums = (Some(old_line_num), Some(new_line_num));
                    old_line_num += 1;
                    new_line_num += 1;
                    (DiffLineType::Context, nums.0, nums.1)
                }
            };

            lines.push(DiffLine {
                line_type,
                content: change.to_string(),
                old_line_number: old_num,
                new_line_number: new_num,
            });
        }

        lines
    }

    pub fn is_unchanged(&self) -> bool {
        self.old_content == self.new_content
    }

    pub fn additions(&self) -> usize {
        self.count(DiffLineType::Addition)
    }

    pub fn deletions(&self) -> usize {
        self.count(DiffLineType::Deletion)
    }

    fn count(&self, line_type: DiffLineType) -> usize {
        self.diff_lines
            .iter()
            .filter(|line| line.line_type == line_type)
            .count()
    }

    pub fn format_unified(&self, context_lines: usize) -> String {
        let old = self.old_content.as_deref().unwrap_or_default();
        let new = self.new_content.as_deref().unwrap_or_default();
        let old_header = match self.old_content {
            Some(_) => format!("a/{}", self.reference),
            None => "/dev/null".to_string(),
        };
        let new_header = match self.new_content {
            Some(_) => format!("b/{}", self.reference),
            None => "/dev/null".to_string(),
        };

        TextDiff::from_lines(old, new)
            .unified_diff()
            .context_radius(context_lines)
            .header(&old_header, &new_header)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_computation() {
        let old_text = "line 1\nline 2\nline 3\n";
        let new_text = "line 1\nline 2 modified\nline 3\nline 4\n";

        let diff_lines = ObjectDiff::compute_diff(old_text, new_text);

        assert!(diff_lines
            .iter()
            .any(|l| l.line_type == DiffLineType::Addition));
        assert!(diff_lines
            .iter()
            .any(|l| l.line_type == DiffLineType::Deletion));
    }

    #[test]
    fn test_object_diff_from_values() {
        let old = json!({"title": "Intro", "draft": true});
        let new = json!({"title": "Intro", "draft": false});

        let diff = ObjectDiff::from_values("notes/intro", Some(&old), Some(&new)).unwrap();

        assert_eq!(diff.reference, "notes/intro");
        assert!(!diff.is_unchanged());
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.deletions(), 1);

        let unified = diff.format_unified(3);
        assert!(unified.starts_with("--- a/notes/intro\n+++ b/notes/intro\n"));
        assert!(unified.contains("-  \"draft\": true"));
        assert!(unified.contains("+  \"draft\": false"));
    }

    #[test]
    fn test_created_object_diffs_against_nothing() {
        let diff = ObjectDiff::from_values("notes/new", None, Some(&json!({"a": 1}))).unwrap();

        assert_eq!(diff.deletions(), 0);
        assert_eq!(diff.additions(), 3);
        assert!(diff.format_unified(1).starts_with("--- /dev/null\n"));
    }

    #[test]
    fn test_single_line_change_does_not_underflow() {
        let diff = ObjectDiff::from_text("x", Some("a\n".into()), Some("b\n".into()));
        assert!(diff.format_unified(0).contains("@@ -1 +1 @@"));
    }
}
