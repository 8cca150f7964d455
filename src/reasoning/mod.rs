//! Reasoning-service seam: free-text generation from a structured state snapshot.
//!
//! Plan and SQL drafts come from an external reasoning service. The orchestrator
//! hands it a [`PromptContext`] snapshot of session state and gets text back;
//! failures surface as `OrchestratorError::Generation` and are absorbed by the
//! owning revision loop as one failed iteration.

pub mod command;

pub use command::CommandReasoner;

use crate::errors::OrchestratorError;
use async_trait::async_trait;

/// Structured snapshot of session state handed to the reasoning service.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub target_schema: String,
    pub target_table_id: String,
    pub source_dataset: String,
    pub source_tables: Vec<String>,
    /// Rendered `table(col TYPE, ...)` lines for the discovered sources.
    pub source_schemas: Vec<String>,
    pub latest_plan: Option<String>,
    pub latest_sql: Option<String>,
    /// Pending critique of the latest revision, already consumed from state.
    pub feedback: Option<String>,
}

impl PromptContext {
    /// Render the transformation-planning prompt.
    pub fn render_plan_prompt(&self) -> String {
        let mut prompt = format!(
            r#"You are an expert ETL architect. Create or revise a high-level transformation plan.

## TARGET
The destination table schema is:
{}

## SOURCES
Available source tables in dataset '{}': {}
"#,
            self.target_schema,
            self.source_dataset,
            self.render_source_tables(),
        );

        if !self.source_schemas.is_empty() {
            prompt.push_str(&format!(
                "\n## SOURCE SCHEMAS\n{}\n",
                self.source_schemas.join("\n")
            ));
        }

        if let Some(prev) = &self.latest_plan {
            prompt.push_str(&format!("\n## PREVIOUS PLAN\n{}\n", prev));
        }
        if let Some(feedback) = &self.feedback {
            prompt.push_str(&format!(
                "\n## FEEDBACK\nRevise the previous plan to address this critique:\n{}\n",
                feedback
            ));
        }

        prompt.push_str(
            "\n## TASK\nRespond with the complete plan only: which source tables to read, \
             how to join and transform them, and how the result maps onto the target schema. \
             Reference source tables by their exact names.",
        );
        prompt
    }

    /// Render the SQL-generation prompt.
    pub fn render_sql_prompt(&self) -> String {
        let mut prompt = format!(
            r#"You are a SQL expert. Write a single executable SELECT query.

## TRANSFORMATION PLAN
{}

## TARGET SCHEMA
{}

## SOURCES
Source dataset: '{}'
Source tables: {}
"#,
            self.latest_plan.as_deref().unwrap_or("(no plan)"),
            self.target_schema,
            self.source_dataset,
            self.render_source_tables(),
        );

        if !self.source_schemas.is_empty() {
            prompt.push_str(&format!(
                "\n## SOURCE SCHEMAS\n{}\n",
                self.source_schemas.join("\n")
            ));
        }

        if let Some(prev) = &self.latest_sql {
            prompt.push_str(&format!("\n## PREVIOUS QUERY\n{}\n", prev));
        }
        if let Some(feedback) = &self.feedback {
            prompt.push_str(&format!(
                "\n## FEEDBACK\nRevise the previous query to address this:\n{}\n",
                feedback
            ));
        }

        prompt.push_str(
            "\n## RULES\n\
             1. Output ONLY a SELECT statement, no CREATE TABLE, no commentary.\n\
             2. Fully qualify all source table names with the source dataset.\n\
             3. The result columns must match the target schema.",
        );
        prompt
    }

    fn render_source_tables(&self) -> String {
        if self.source_tables.is_empty() {
            "(none discovered)".to_string()
        } else {
            self.source_tables.join(", ")
        }
    }
}

/// External reasoning service invoked with a rendered prompt.
///
/// Must be deterministic enough to be retried: the revision loop re-invokes it
/// with fresh feedback rather than handling failures specially.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, OrchestratorError>;
}

/// Strip Markdown code fences from reasoner output.
///
/// Reasoning services routinely wrap SQL in ```sql fences; the engine wants
/// bare statements.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let without_open = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return trimmed.to_string(),
    };
    without_open
        .trim_end()
        .trim_end_matches("```")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> PromptContext {
        PromptContext {
            target_schema: "CREATE TABLE proj.ds.daily (day DATE, total NUMERIC)".into(),
            target_table_id: "proj.ds.daily".into(),
            source_dataset: "proj.raw".into(),
            source_tables: vec!["orders".into(), "customers".into()],
            source_schemas: vec![],
            latest_plan: None,
            latest_sql: None,
            feedback: None,
        }
    }

    #[test]
    fn test_plan_prompt_lists_sources_and_target() {
        let prompt = context().render_plan_prompt();
        assert!(prompt.contains("orders, customers"));
        assert!(prompt.contains("proj.raw"));
        assert!(prompt.contains("CREATE TABLE proj.ds.daily"));
        assert!(!prompt.contains("## FEEDBACK"));
    }

    #[test]
    fn test_plan_prompt_includes_feedback_when_present() {
        let mut ctx = context();
        ctx.latest_plan = Some("join orders to customers".into());
        ctx.feedback = Some("missing the customers table".into());
        let prompt = ctx.render_plan_prompt();
        assert!(prompt.contains("## PREVIOUS PLAN"));
        assert!(prompt.contains("## FEEDBACK"));
        assert!(prompt.contains("missing the customers table"));
    }

    #[test]
    fn test_plan_prompt_includes_source_schemas_when_known() {
        let mut ctx = context();
        ctx.source_schemas = vec!["orders(id INT64, day DATE, total NUMERIC)".into()];
        let prompt = ctx.render_plan_prompt();
        assert!(prompt.contains("## SOURCE SCHEMAS"));
        assert!(prompt.contains("orders(id INT64, day DATE, total NUMERIC)"));

        assert!(!context().render_plan_prompt().contains("## SOURCE SCHEMAS"));
    }

    #[test]
    fn test_plan_prompt_empty_sources_marked() {
        let mut ctx = context();
        ctx.source_tables.clear();
        assert!(ctx.render_plan_prompt().contains("(none discovered)"));
    }

    #[test]
    fn test_sql_prompt_carries_plan_and_rules() {
        let mut ctx = context();
        ctx.latest_plan = Some("aggregate orders per day".into());
        let prompt = ctx.render_sql_prompt();
        assert!(prompt.contains("aggregate orders per day"));
        assert!(prompt.contains("ONLY a SELECT statement"));
    }

    #[test]
    fn test_strip_code_fences_sql_block() {
        let text = "```sql\nSELECT day, SUM(total) FROM t GROUP BY day\n```";
        assert_eq!(
            strip_code_fences(text),
            "SELECT day, SUM(total) FROM t GROUP BY day"
        );
    }

    #[test]
    fn test_strip_code_fences_plain_text_untouched() {
        assert_eq!(strip_code_fences("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn test_strip_code_fences_bare_fence() {
        let text = "```\nSELECT 1\n```";
        assert_eq!(strip_code_fences(text), "SELECT 1");
    }
}
