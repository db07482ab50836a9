//! Narrowing of the generic expression tree into IQL nodes
//!
//! The grammar accepts a Python expression subset; this pass keeps only
//! boolean combinators over calls of catalog functions and turns call
//! arguments into [`RawArg`]s for the resolver.

use iql_registry::{Catalog, ExposedFunction};
use pest::iterators::Pair;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{IqlError, Snippet};
use crate::grammar::Rule;

const TOP_LEVEL: &str = "at top level";
const IN_BOOL_OP: &str = "inside BoolOp";
const IN_UNARY_OP: &str = "inside UnaryOp";
const IN_CALL: &str = "inside Call";
const IN_AGGREGATION: &str = "in an aggregation";

/// Boolean tree whose calls are checked against the catalog but whose
/// arguments are still unresolved
#[derive(Debug)]
pub(crate) enum Draft<'c> {
    And(Vec<Draft<'c>>),
    Or(Vec<Draft<'c>>),
    Not(Box<Draft<'c>>),
    Call(DraftCall<'c>),
}

#[derive(Debug)]
pub(crate) struct DraftCall<'c> {
    pub function: &'c ExposedFunction,
    pub args: Vec<RawArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Call argument as written, before context lookup and validation
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawArg {
    Literal(Literal, Snippet),
    List(Vec<RawArg>, Snippet),
    Name(String, Snippet),
    Unsupported(Snippet),
}

impl RawArg {
    pub fn snippet(&self) -> &Snippet {
        match self {
            RawArg::Literal(_, snippet)
            | RawArg::List(_, snippet)
            | RawArg::Name(_, snippet)
            | RawArg::Unsupported(snippet) => snippet,
        }
    }
}

pub(crate) struct Builder<'s, 'c> {
    source: &'s str,
    catalog: &'c Catalog,
}

impl<'s, 'c> Builder<'s, 'c> {
    pub fn new(source: &'s str, catalog: &'c Catalog) -> Self {
        Self { source, catalog }
    }

    pub fn filter(&self, expr: Pair<'_, Rule>) -> Result<Draft<'c>, IqlError> {
        self.node(expr, TOP_LEVEL)
    }

    pub fn aggregation(&self, expr: Pair<'_, Rule>) -> Result<DraftCall<'c>, IqlError> {
        let pair = descend(expr);
        match pair.as_rule() {
            Rule::postfix => self.call(pair, TOP_LEVEL),
            Rule::or_test | Rule::and_test | Rule::not_test => Err(self.unsupported(&pair, IN_AGGREGATION)),
            _ => Err(self.unsupported(&pair, TOP_LEVEL)),
        }
    }

    fn node(&self, pair: Pair<'_, Rule>, context: &str) -> Result<Draft<'c>, IqlError> {
        let pair = descend(pair);
        match pair.as_rule() {
            Rule::or_test => Ok(Draft::Or(self.operands(pair, Rule::and_test)?)),
            Rule::and_test => Ok(Draft::And(self.operands(pair, Rule::not_test)?)),
            Rule::not_test => {
                let operand = pair
                    .clone()
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::not_test)
                    .ok_or_else(|| self.unsupported(&pair, context))?;
                Ok(Draft::Not(Box::new(self.node(operand, IN_UNARY_OP)?)))
            }
            Rule::postfix => Ok(Draft::Call(self.call(pair, context)?)),
            _ => Err(self.unsupported(&pair, context)),
        }
    }

    fn operands(&self, pair: Pair<'_, Rule>, operand: Rule) -> Result<Vec<Draft<'c>>, IqlError> {
        pair.into_inner()
            .filter(|p| p.as_rule() == operand)
            .map(|p| self.node(p, IN_BOOL_OP))
            .collect()
    }

    fn call(&self, pair: Pair<'_, Rule>, context: &str) -> Result<DraftCall<'c>, IqlError> {
        let mut inner = pair.clone().into_inner();
        let (callee, args) = match (inner.next(), inner.next(), inner.next()) {
            (Some(callee), Some(args), None)
                if callee.as_rule() == Rule::ident && args.as_rule() == Rule::call =>
            {
                (callee, args)
            }
            _ => return Err(self.unsupported(&pair, context)),
        };

        let snippet = Snippet::of(&pair, self.source);
        let name = callee.as_str();
        let function = self
            .catalog
            .lookup(name)
            .map_err(|_| IqlError::FunctionNotExists {
                name: name.to_string(),
                snippet: snippet.clone(),
            })?;

        let mut raw = Vec::new();
        for arg in args.into_inner() {
            match arg.as_rule() {
                Rule::keyword_arg | Rule::star_arg => return Err(self.unsupported(&arg, IN_CALL)),
                _ => raw.push(self.argument(arg)),
            }
        }

        if raw.len() != function.arity() {
            return Err(IqlError::IncorrectNumberArguments {
                name: function.name.clone(),
                expected: function.arity(),
                actual: raw.len(),
                snippet,
            });
        }

        Ok(DraftCall { function, args: raw })
    }

    fn argument(&self, pair: Pair<'_, Rule>) -> RawArg {
        let pair = descend(pair);
        let snippet = Snippet::of(&pair, self.source);
        let literal = match pair.as_rule() {
            Rule::int => pair.as_str().replace('_', "").parse().ok().map(Literal::Int),
            Rule::float => pair
                .as_str()
                .replace('_', "")
                .parse()
                .ok()
                .filter(|v: &f64| v.is_finite())
                .map(Literal::Float),
            Rule::string => string_value(pair.clone()).map(Literal::Str),
            Rule::true_lit => Some(Literal::Bool(true)),
            Rule::false_lit => Some(Literal::Bool(false)),
            Rule::none_lit => Some(Literal::None),
            Rule::list if is_comprehension(&pair) => None,
            Rule::list | Rule::group => {
                let items = pair
                    .into_inner()
                    .filter(|item| item.as_rule() != Rule::comma)
                    .map(|item| self.argument(item))
                    .collect();
                return RawArg::List(items, snippet);
            }
            Rule::ident => return RawArg::Name(pair.as_str().to_string(), snippet),
            Rule::factor => return self.signed(pair, snippet),
            _ => None,
        };
        match literal {
            Some(literal) => RawArg::Literal(literal, snippet),
            None => RawArg::Unsupported(snippet),
        }
    }

    /// Unary sign applied directly to a numeric literal
    fn signed(&self, pair: Pair<'_, Rule>, snippet: Snippet) -> RawArg {
        let mut inner = pair.into_inner();
        let (op, operand) = match (inner.next(), inner.next()) {
            (Some(op), Some(operand)) => (op, operand),
            _ => return RawArg::Unsupported(snippet),
        };
        let literal = match (op.as_str(), self.argument(operand)) {
            ("-", RawArg::Literal(Literal::Int(v), _)) => v.checked_neg().map(Literal::Int),
            ("-", RawArg::Literal(Literal::Float(v), _)) => Some(Literal::Float(-v)),
            ("+", RawArg::Literal(lit @ (Literal::Int(_) | Literal::Float(_)), _)) => Some(lit),
            _ => None,
        };
        match literal {
            Some(literal) => RawArg::Literal(literal, snippet),
            None => RawArg::Unsupported(snippet),
        }
    }

    fn unsupported(&self, pair: &Pair<'_, Rule>, context: &str) -> IqlError {
        IqlError::UnsupportedSyntax {
            kind: syntax_kind(pair).to_string(),
            context: context.to_string(),
            snippet: Snippet::of(pair, self.source),
        }
    }
}

/// Skip precedence layers that wrap a single operand, and parentheses.
pub(crate) fn descend(pair: Pair<'_, Rule>) -> Pair<'_, Rule> {
    let mut pair = pair;
    loop {
        let transparent = match pair.as_rule() {
            Rule::expr_stmt | Rule::expr => true,
            Rule::group
            | Rule::ternary
            | Rule::or_test
            | Rule::and_test
            | Rule::not_test
            | Rule::comparison
            | Rule::arith
            | Rule::term
            | Rule::factor
            | Rule::power
            | Rule::postfix => pair.clone().into_inner().count() == 1,
            _ => false,
        };
        if !transparent {
            return pair;
        }
        match pair.clone().into_inner().next() {
            Some(inner) => pair = inner,
            None => return pair,
        }
    }
}

/// Name of a construct in error messages
fn syntax_kind(pair: &Pair<'_, Rule>) -> &'static str {
    match pair.as_rule() {
        Rule::or_test => "BoolOp(or)",
        Rule::and_test => "BoolOp(and)",
        Rule::not_test => "UnaryOp(not)",
        Rule::comparison => "Compare",
        Rule::arith | Rule::term | Rule::power => "BinOp",
        Rule::factor => "UnaryOp",
        Rule::lambda => "Lambda",
        Rule::ternary => "IfExp",
        Rule::postfix => match pair.clone().into_inner().last().map(|p| p.as_rule()) {
            Some(Rule::subscript) => "Subscript",
            Some(Rule::attribute) => "Attribute",
            _ => "Call",
        },
        Rule::int | Rule::float | Rule::string | Rule::true_lit | Rule::false_lit | Rule::none_lit => {
            "Constant"
        }
        Rule::fstring => "JoinedStr",
        Rule::ident => "Name",
        Rule::list if is_comprehension(pair) => "ListComp",
        Rule::list => "List",
        Rule::group => "Tuple",
        Rule::dict => "Dict",
        Rule::keyword_arg => "Keyword argument",
        Rule::star_arg => "Starred",
        _ => "Expression",
    }
}

fn is_comprehension(pair: &Pair<'_, Rule>) -> bool {
    pair.clone().into_inner().any(|p| p.as_rule() == Rule::comp_for)
}

fn string_value(pair: Pair<'_, Rule>) -> Option<String> {
    let mut raw = false;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::raw_prefix => raw = part.as_str().eq_ignore_ascii_case("r"),
            Rule::dq_string | Rule::sq_string => {
                let body = part.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                return if raw { Some(body.to_string()) } else { unescape(body) };
            }
            _ => {}
        }
    }
    None
}

/// Python string escapes; unknown escapes keep their backslash
fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            d @ '0'..='7' => out.push(octal_char(d, &mut chars)?),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '\n' => {}
            'x' => out.push(hex_char(&mut chars, 2)?),
            'u' => out.push(hex_char(&mut chars, 4)?),
            'U' => out.push(hex_char(&mut chars, 8)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

/// Up to three octal digits, the first already consumed
fn octal_char(first: char, chars: &mut Peekable<Chars<'_>>) -> Option<char> {
    let mut code = first.to_digit(8)?;
    for _ in 0..2 {
        match chars.peek().and_then(|c| c.to_digit(8)) {
            Some(digit) => {
                code = code * 8 + digit;
                chars.next();
            }
            None => break,
        }
    }
    char::from_u32(code)
}

fn hex_char(chars: &mut Peekable<Chars<'_>>, len: usize) -> Option<char> {
    let code: String = chars.by_ref().take(len).collect();
    if code.len() != len {
        return None;
    }
    u32::from_str_radix(&code, 16).ok().and_then(char::from_u32)
}
