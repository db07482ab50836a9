//! Pest-generated parser for the IQL expression grammar

use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "iql.pest"]
pub struct IqlParser;
