//! Prompt templates for IQL generation
//!
//! The system prompt teaches the model the expression shape for the mode,
//! lists the catalog signatures and the context aliases it may reference,
//! and names the sentinel to answer with when the question cannot be
//! expressed.

use iql_ast::IqlError;
use iql_ir::Context;
use iql_registry::Catalog;

use crate::llm::Message;

/// System prompt for filter expressions
pub const FILTER_PROMPT: &str = r#"You are an expert at translating natural language questions into IQL filter expressions.

IQL is a subset of Python expression syntax:
- Call the functions listed below with positional arguments only.
- Combine calls with `and`, `or` and `not`; use parentheses to group.
- Arguments are literals: strings ('text'), integers, floats, True, False, None, or lists of literals ([1, 2]).
- A context alias listed below may be passed as a bare name where the parameter type names its context type.
- Comparisons, arithmetic, attribute access, keyword arguments and any function not listed are invalid.

Examples:
filter_by_city('Cracow') and not filter_by_age(30)
(filter_by_name(['John', 'Anne']) or filter_by_city('Paris')) and filter_by_employer(my_company)"#;

/// System prompt for aggregation expressions
pub const AGGREGATION_PROMPT: &str = r#"You are an expert at translating natural language questions into IQL aggregation expressions.

IQL is a subset of Python expression syntax:
- Answer with exactly one call of a function listed below, using positional arguments only.
- Do not combine calls: `and`, `or` and `not` are invalid in an aggregation.
- Arguments are literals: strings ('text'), integers, floats, True, False, None, or lists of literals ([1, 2]).
- A context alias listed below may be passed as a bare name where the parameter type names its context type.

Examples:
count_by_city('Cracow')
mean_salary(['engineering', 'sales'])"#;

/// Opening conversation: system rules plus the user's question.
pub fn conversation(
    template: &str,
    question: &str,
    catalog: &Catalog,
    contexts: &[Context],
    sentinel: &str,
) -> Vec<Message> {
    vec![
        Message::system(system_prompt(template, catalog, contexts, sentinel)),
        Message::user(question),
    ]
}

fn system_prompt(template: &str, catalog: &Catalog, contexts: &[Context], sentinel: &str) -> String {
    let mut prompt = format!("{}\n\n## Available functions\n\n{}", template, catalog.describe());

    if !contexts.is_empty() {
        prompt.push_str("\n\n## Available contexts\n\n");
        let aliases = contexts
            .iter()
            .map(|c| format!("{}: {}", c.alias, c.type_name))
            .collect::<Vec<_>>()
            .join("\n");
        prompt.push_str(&aliases);
    }

    prompt.push_str(&format!(
        "\n\nIf the question cannot be answered with the functions above, respond with exactly `{}`.\n\
         Return ONLY the expression, no explanations.",
        sentinel
    ));
    prompt
}

/// Feedback turn sent after the model produced IQL that failed to parse or validate
pub fn feedback(question: &str, iql: &str, error: &IqlError) -> Message {
    Message::user(format!(
        "The expression you generated for the question \"{}\" is invalid.\n\n\
         Expression: {}\n\
         Error: {}\n\n\
         Please fix the expression and return ONLY the corrected IQL.",
        question, iql, error
    ))
}
