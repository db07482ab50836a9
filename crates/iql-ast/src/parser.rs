//! IQL entry points
//!
//! Parsing runs in two phases. The synchronous phase normalizes the text,
//! parses it with the pest grammar, enforces the single-expression statement
//! shape and narrows the tree against the catalog. The asynchronous phase
//! resolves and validates arguments, awaiting similarity lookups.

use iql_ir::{Context, FunctionCall, IqlQuery, Node};
use iql_registry::Catalog;
use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest::Parser;
use tracing::debug;

use crate::builder::{Builder, Draft, DraftCall};
use crate::error::{IqlError, ParseError, Snippet};
use crate::grammar::{IqlParser, Rule};
use crate::normalize::normalize;
use crate::resolver::Resolver;

/// Parse a filter expression: any boolean combination of catalog calls.
pub async fn parse_filter(
    source: &str,
    catalog: &Catalog,
    contexts: &[Context],
) -> Result<IqlQuery<Node>, ParseError> {
    let draft = filter_draft(source, catalog)?;
    let root = Resolver::new(contexts).node(draft).await?;
    debug!(iql = %source, tree = %root, "Parsed IQL filter");
    Ok(IqlQuery {
        root,
        source: source.to_string(),
    })
}

/// Parse an aggregation expression: exactly one catalog call.
pub async fn parse_aggregation(
    source: &str,
    catalog: &Catalog,
    contexts: &[Context],
) -> Result<IqlQuery<FunctionCall>, ParseError> {
    let draft = aggregation_draft(source, catalog)?;
    let root = Resolver::new(contexts).call(draft).await?;
    debug!(iql = %source, call = %root, "Parsed IQL aggregation");
    Ok(IqlQuery {
        root,
        source: source.to_string(),
    })
}

fn filter_draft<'c>(source: &str, catalog: &'c Catalog) -> Result<Draft<'c>, IqlError> {
    let normalized = normalize(source);
    let expr = single_expression(&normalized, source)?;
    Builder::new(source, catalog).filter(expr)
}

fn aggregation_draft<'c>(source: &str, catalog: &'c Catalog) -> Result<DraftCall<'c>, IqlError> {
    let normalized = normalize(source);
    let expr = single_expression(&normalized, source)?;
    Builder::new(source, catalog).aggregation(expr)
}

/// The one expression statement of the module, or the structural error.
fn single_expression<'i>(normalized: &'i str, source: &str) -> Result<Pair<'i, Rule>, IqlError> {
    let module = IqlParser::parse(Rule::module, normalized)
        .map_err(|e| syntax_error(e, source))?
        .next()
        .ok_or_else(|| IqlError::NoStatement {
            text: source.to_string(),
        })?;

    let mut statements: Vec<_> = module
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .collect();

    if statements.len() > 1 {
        return Err(IqlError::MultipleStatements {
            statements: statements.iter().map(|s| Snippet::of(s, source)).collect(),
        });
    }
    let statement = statements.pop().ok_or_else(|| IqlError::NoStatement {
        text: source.to_string(),
    })?;

    match statement.as_rule() {
        Rule::expr_stmt => Ok(statement),
        _ => Err(IqlError::NoExpression {
            snippet: Snippet::of(&statement, source),
        }),
    }
}

fn syntax_error(err: pest::error::Error<Rule>, source: &str) -> IqlError {
    let err = err.renamed_rules(|rule| match rule {
        Rule::EOI => "end of input".to_string(),
        Rule::expr => "expression".to_string(),
        Rule::ident => "identifier".to_string(),
        Rule::assign_op => "assignment".to_string(),
        Rule::comma => "','".to_string(),
        other => format!("{:?}", other),
    });
    let (line, column) = match err.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    IqlError::Syntax {
        message: err.variant.message().to_string(),
        line,
        column,
        text: source.to_string(),
    }
}
