// Reconciliation of the task list into a display-ready view

use crate::filter::Filter;
use crate::models::Task;
use serde::Serialize;

/// Task totals, always computed over the whole store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl Counts {
    pub fn of(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            total: tasks.len(),
            active: tasks.len() - completed,
            completed,
        }
    }
}

/// One visible task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub id: String,
    pub completed: bool,
    /// Task text with HTML-unsafe characters escaped
    pub text: String,
    /// Raw text offered for in-place editing, present only while this row is being edited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_text: Option<String>,
}

impl Row {
    pub fn is_editing(&self) -> bool {
        self.edit_text.is_some()
    }
}

/// Everything a UI layer needs after a reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct View {
    pub filter: Filter,
    pub rows: Vec<Row>,
    pub counts: Counts,
    pub show_empty: bool,
}

/// Compute the view for `tasks` under `filter`
///
/// `editing` names the task currently open for in-place editing, if any.
pub fn reconcile(tasks: &[Task], filter: Filter, editing: Option<&str>) -> View {
    let rows: Vec<Row> = tasks
        .iter()
        .filter(|t| filter.matches(t))
        .map(|t| Row {
            id: t.id.clone(),
            completed: t.completed,
            text: escape_html(&t.text),
            edit_text: (editing == Some(t.id.as_str())).then(|| t.text.clone()),
        })
        .collect();

    View {
        filter,
        show_empty: rows.is_empty(),
        rows,
        counts: Counts::of(tasks),
    }
}

/// Neutralize the characters that are unsafe in HTML text and attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks() -> Vec<Task> {
        let mut tasks = vec![
            Task::new("one".to_string()),
            Task::new("two".to_string()),
            Task::new("three".to_string()),
        ];
        tasks[1].completed = true;
        tasks
    }

    fn texts(view: &View) -> Vec<&str> {
        view.rows.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_reconcile_filters_in_store_order() {
        let tasks = tasks();

        assert_eq!(texts(&reconcile(&tasks, Filter::All, None)), vec!["one", "two", "three"]);
        assert_eq!(texts(&reconcile(&tasks, Filter::Active, None)), vec!["one", "three"]);
        assert_eq!(texts(&reconcile(&tasks, Filter::Completed, None)), vec!["two"]);
    }

    #[test]
    fn test_counts_ignore_filter() {
        let tasks = tasks();
        for filter in [Filter::All, Filter::Active, Filter::Completed] {
            let view = reconcile(&tasks, filter, None);
            assert_eq!(view.counts.total, 3);
            assert_eq!(view.counts.active, 2);
            assert_eq!(view.counts.completed, 1);
            assert_eq!(view.counts.active + view.counts.completed, view.counts.total);
        }
    }

    #[test]
    fn test_empty_state() {
        let view = reconcile(&[], Filter::All, None);
        assert!(view.show_empty);
        assert!(view.rows.is_empty());
        assert_eq!(view.counts, Counts::default());

        let mut tasks = tasks();
        tasks.retain(|t| !t.completed);
        let view = reconcile(&tasks, Filter::Completed, None);
        assert!(view.show_empty);
        assert_eq!(view.counts.total, 2);
    }

    #[test]
    fn test_editing_row_exposes_raw_text() {
        let mut tasks = tasks();
        tasks[0].text = "a < b".to_string();
        let id = tasks[0].id.clone();

        let view = reconcile(&tasks, Filter::All, Some(&id));
        assert!(view.rows[0].is_editing());
        assert_eq!(view.rows[0].edit_text.as_deref(), Some("a < b"));
        assert_eq!(view.rows[0].text, "a &lt; b");
        assert!(!view.rows[1].is_editing());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("plain"), "plain");
        assert_eq!(
            escape_html(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#39;y&#39;&quot;)&lt;/script&gt;"
        );
    }
}
