//! Argument resolution
//!
//! Turns [`RawArg`]s into [`Value`]s: contexts are substituted for bare
//! identifiers and literals go through the parameter's similarity index.
//! Siblings (call arguments, list elements, boolean operands) resolve
//! concurrently; the first failure wins and the remaining futures are dropped.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use iql_ir::{Context, FunctionCall, Node, Value};
use iql_registry::Parameter;
use tracing::debug;

use crate::builder::{Draft, DraftCall, Literal, RawArg};
use crate::error::{IqlError, ParseError, Snippet};
use crate::validator::validate_argument;

#[derive(Clone, Copy)]
pub(crate) struct Resolver<'a> {
    contexts: &'a [Context],
}

impl<'a> Resolver<'a> {
    pub fn new(contexts: &'a [Context]) -> Self {
        Self { contexts }
    }

    pub fn node(self, draft: Draft<'a>) -> BoxFuture<'a, Result<Node, ParseError>> {
        async move {
            match draft {
                Draft::And(children) => Ok(Node::And {
                    children: self.nodes(children).await?,
                }),
                Draft::Or(children) => Ok(Node::Or {
                    children: self.nodes(children).await?,
                }),
                Draft::Not(child) => Ok(Node::not(self.node(*child).await?)),
                Draft::Call(call) => Ok(Node::Call(self.call(call).await?)),
            }
        }
        .boxed()
    }

    async fn nodes(self, children: Vec<Draft<'a>>) -> Result<Vec<Node>, ParseError> {
        try_join_all(children.into_iter().map(|child| self.node(child))).await
    }

    pub async fn call(self, call: DraftCall<'a>) -> Result<FunctionCall, ParseError> {
        let DraftCall { function, args } = call;
        let arguments = try_join_all(
            function
                .parameters
                .iter()
                .zip(args)
                .map(|(param, arg)| self.argument(param, arg)),
        )
        .await?;
        Ok(FunctionCall::new(function.name.clone(), arguments))
    }

    async fn argument(self, param: &'a Parameter, arg: RawArg) -> Result<Value, ParseError> {
        let snippet = arg.snippet().clone();
        let value = self.value(param, arg).await?;
        Ok(validate_argument(value, param, &snippet)?)
    }

    fn value(self, param: &'a Parameter, arg: RawArg) -> BoxFuture<'a, Result<Value, ParseError>> {
        async move {
            match arg {
                RawArg::List(items, _) => {
                    let values =
                        try_join_all(items.into_iter().map(|item| self.value(param, item))).await?;
                    Ok(Value::List(values))
                }
                RawArg::Name(alias, snippet) => Ok(self.context(param, alias, snippet)?),
                RawArg::Literal(literal, _) => self.literal(param, literal).await,
                RawArg::Unsupported(snippet) => Err(IqlError::ArgumentParsing { snippet }.into()),
            }
        }
        .boxed()
    }

    fn context(self, param: &Parameter, alias: String, snippet: Snippet) -> Result<Value, IqlError> {
        if param.context_types().is_empty() {
            return Err(IqlError::ContextNotAllowed {
                parameter: param.name.clone(),
                snippet,
            });
        }
        let context = match self.contexts.iter().find(|c| c.alias == alias) {
            Some(context) => context,
            None => return Err(IqlError::ContextNotFound { alias, snippet }),
        };
        if !param.accepts_context(&context.type_name) {
            return Err(IqlError::ContextNotAllowed {
                parameter: param.name.clone(),
                snippet,
            });
        }
        Ok(Value::Context(context.clone()))
    }

    async fn literal(self, param: &'a Parameter, literal: Literal) -> Result<Value, ParseError> {
        let value = match literal {
            Literal::None => return Ok(Value::None),
            Literal::Bool(v) => Value::Bool(v),
            Literal::Int(v) => Value::Int(v),
            Literal::Float(v) => Value::Float(v),
            Literal::Str(v) => Value::Str(v),
        };
        let Some(index) = &param.similarity else {
            return Ok(value);
        };

        let text = match &value {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        };
        match index.similar(&text).await? {
            Some(found) => {
                debug!(
                    parameter = %param.name,
                    index = index.name(),
                    from = %text,
                    to = %found,
                    "Similarity match"
                );
                Ok(Value::Str(found))
            }
            None => Ok(value),
        }
    }
}
