//! Parser tests: grammar narrowing, argument resolution and validation

use async_trait::async_trait;
use iql_ast::{parse_aggregation, parse_filter, IqlError, ParseError};
use iql_ir::{Context, FunctionCall, Node, ParamType, Value};
use iql_registry::{Catalog, ExposedFunction, Parameter, SimilarityError, SimilarityIndex};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn call(name: &str, args: Vec<Value>) -> Node {
    Node::Call(FunctionCall::new(name, args))
}

fn people_catalog() -> Catalog {
    Catalog::new(vec![
        ExposedFunction::new("filter_by_name", vec![Parameter::new("name", ParamType::list(ParamType::Str))]),
        ExposedFunction::new("filter_by_city", vec![Parameter::new("city", ParamType::Str)]),
        ExposedFunction::new("filter_by_age", vec![Parameter::new("age", ParamType::Int)]),
        ExposedFunction::new("filter_by_score", vec![Parameter::new("score", ParamType::Float)]),
        ExposedFunction::new(
            "filter_by_range",
            vec![Parameter::new("low", ParamType::Int), Parameter::new("high", ParamType::Int)],
        ),
        ExposedFunction::new(
            "filter_by_home",
            vec![Parameter::new(
                "home",
                ParamType::Union(vec![ParamType::Int, ParamType::context("City")]),
            )],
        ),
        ExposedFunction::new(
            "filter_by_employer",
            vec![Parameter::new(
                "employer",
                ParamType::Union(vec![ParamType::Str, ParamType::context("Company")]),
            )],
        ),
        ExposedFunction::new(
            "filter_by_manager",
            vec![Parameter::new("manager", ParamType::optional(ParamType::Str))],
        ),
    ])
    .unwrap()
}

fn iql_error(result: Result<impl std::fmt::Debug, ParseError>) -> IqlError {
    match result {
        Err(ParseError::Iql(err)) => err,
        other => panic!("expected IQL error, got {:?}", other),
    }
}

async fn filter(source: &str) -> Result<Node, ParseError> {
    parse_filter(source, &people_catalog(), &[]).await.map(|q| q.root)
}

#[tokio::test]
async fn test_negated_conjunction() {
    let root = filter("not (filter_by_name(['John','Anne']) and filter_by_city('cracow'))")
        .await
        .unwrap();
    assert_eq!(
        root,
        Node::not(Node::And {
            children: vec![
                call("filter_by_name", vec![Value::List(vec![Value::str("John"), Value::str("Anne")])]),
                call("filter_by_city", vec![Value::str("cracow")]),
            ],
        })
    );
}

#[tokio::test]
async fn test_keywords_case_insensitive_outside_quotes() {
    let catalog = Catalog::new(vec![
        ExposedFunction::new(
            "filter",
            vec![Parameter::new("column", ParamType::context("Column"))],
        ),
        ExposedFunction::new("filter2", vec![Parameter::new("value", ParamType::Str)]),
    ])
    .unwrap();
    let x = Context::new("x", "Column", json!("age"));

    let query = parse_filter(r#"filter(x) AND filter2("AND")"#, &catalog, &[x.clone()])
        .await
        .unwrap();
    assert_eq!(
        query.root,
        Node::And {
            children: vec![
                call("filter", vec![Value::Context(x)]),
                call("filter2", vec![Value::str("AND")]),
            ],
        }
    );
    assert_eq!(query.source, r#"filter(x) AND filter2("AND")"#);
}

#[tokio::test]
async fn test_mixed_case_operators() {
    let root = filter("NOT filter_by_age(3) Or filter_by_city('x')").await.unwrap();
    assert_eq!(
        root,
        Node::Or {
            children: vec![
                Node::not(call("filter_by_age", vec![Value::Int(3)])),
                call("filter_by_city", vec![Value::str("x")]),
            ],
        }
    );
}

#[tokio::test]
async fn test_bool_ops_are_flattened() {
    let root = filter("filter_by_age(1) and filter_by_age(2) and filter_by_age(3) or filter_by_age(4)")
        .await
        .unwrap();
    match root {
        Node::Or { children } => {
            assert_eq!(children.len(), 2);
            assert!(matches!(&children[0], Node::And { children } if children.len() == 3));
        }
        other => panic!("expected Or, got {:?}", other),
    }
}

#[tokio::test]
async fn test_argument_count() {
    let err = iql_error(filter("filter_by_range(1)").await);
    assert!(matches!(
        err,
        IqlError::IncorrectNumberArguments { ref name, expected: 2, actual: 1, .. } if name == "filter_by_range"
    ));
    assert_eq!(
        filter("filter_by_range(1,2)").await.unwrap(),
        call("filter_by_range", vec![Value::Int(1), Value::Int(2)])
    );
}

#[tokio::test]
async fn test_unknown_function() {
    let err = iql_error(filter("filter_by_age(1) and filter_by_height(180)").await);
    match err {
        IqlError::FunctionNotExists { name, snippet } => {
            assert_eq!(name, "filter_by_height");
            assert_eq!(snippet.text, "filter_by_height(180)");
            assert_eq!(snippet.span.start, 21);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_int_widened_to_float_and_str_rejected_for_int() {
    assert_eq!(
        filter("filter_by_score(3)").await.unwrap(),
        call("filter_by_score", vec![Value::Float(3.0)])
    );

    let err = iql_error(filter("filter_by_age('3')").await);
    match err {
        IqlError::ArgumentValidation { parameter, snippet, .. } => {
            assert_eq!(parameter, "age");
            assert_eq!(snippet.text, "'3'");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_list_element_types() {
    let err = iql_error(filter("filter_by_name(['John', 7])").await);
    assert!(matches!(err, IqlError::ArgumentValidation { ref reason, .. } if reason.contains("element 1")));
}

#[tokio::test]
async fn test_negative_and_signed_numbers() {
    assert_eq!(
        filter("filter_by_range(-5, +10)").await.unwrap(),
        call("filter_by_range", vec![Value::Int(-5), Value::Int(10)])
    );
    assert_eq!(
        filter("filter_by_score(-0.5)").await.unwrap(),
        call("filter_by_score", vec![Value::Float(-0.5)])
    );
}

#[tokio::test]
async fn test_none_only_for_optional() {
    assert_eq!(
        filter("filter_by_manager(None)").await.unwrap(),
        call("filter_by_manager", vec![Value::None])
    );
    let err = iql_error(filter("filter_by_city(None)").await);
    assert!(matches!(err, IqlError::ArgumentValidation { .. }));
}

#[tokio::test]
async fn test_context_resolution() {
    let catalog = people_catalog();
    let home = Context::new("ctx", "City", json!({"name": "Cracow"}));
    let contexts = vec![home.clone()];

    let query = parse_filter("filter_by_home(ctx)", &catalog, &contexts).await.unwrap();
    assert_eq!(query.root, call("filter_by_home", vec![Value::Context(home)]));

    let err = iql_error(parse_filter("filter_by_home(other_name)", &catalog, &contexts).await);
    assert!(matches!(err, IqlError::ContextNotFound { ref alias, .. } if alias == "other_name"));

    // Parameter admits contexts, but not of type City
    let err = iql_error(parse_filter("filter_by_employer(ctx)", &catalog, &contexts).await);
    assert!(matches!(err, IqlError::ContextNotAllowed { ref parameter, .. } if parameter == "employer"));

    // Parameter admits no contexts at all
    let err = iql_error(parse_filter("filter_by_age(ctx)", &catalog, &contexts).await);
    assert!(matches!(err, IqlError::ContextNotAllowed { ref parameter, .. } if parameter == "age"));
}

#[tokio::test]
async fn test_unsupported_syntax_carries_context() {
    let err = iql_error(filter("filter_by_age(1) and filter_by_age(2) > 1").await);
    match err {
        IqlError::UnsupportedSyntax { kind, context, snippet } => {
            assert_eq!(kind, "Compare");
            assert_eq!(context, "inside BoolOp");
            assert_eq!(snippet.text, "filter_by_age(2) > 1");
        }
        other => panic!("unexpected error {:?}", other),
    }

    for (source, kind) in [
        ("filter_by_age(1) + filter_by_age(2)", "BinOp"),
        ("people.filter_by_age(1)", "Call"),
        ("filter_by_age", "Name"),
        ("'just a string'", "Constant"),
        ("[filter_by_age(1)]", "List"),
        ("filter_by_age(1) if True else filter_by_age(2)", "IfExp"),
        ("lambda: filter_by_age(1)", "Lambda"),
    ] {
        let err = iql_error(filter(source).await);
        assert!(
            matches!(err, IqlError::UnsupportedSyntax { kind: ref k, .. } if k == kind),
            "{} -> {:?}",
            source,
            err
        );
    }
}

#[tokio::test]
async fn test_keyword_arguments_rejected() {
    let err = iql_error(filter("filter_by_age(age=3)").await);
    assert!(matches!(
        err,
        IqlError::UnsupportedSyntax { ref context, .. } if context == "inside Call"
    ));
}

#[tokio::test]
async fn test_argument_parsing_errors() {
    for source in [
        "filter_by_city(f'{x}')",
        "filter_by_age(1 + 2)",
        "filter_by_age(filter_by_age(1))",
        "filter_by_age(lambda: 1)",
        "filter_by_name([n for n in names])",
        "filter_by_city({'a': 1})",
    ] {
        let err = iql_error(filter(source).await);
        assert!(matches!(err, IqlError::ArgumentParsing { .. }), "{} -> {:?}", source, err);
    }
}

#[tokio::test]
async fn test_aggregation_single_call() {
    let catalog = Catalog::new(vec![
        ExposedFunction::new("f", vec![Parameter::new("a", ParamType::Str)]),
        ExposedFunction::new("g", vec![Parameter::new("b", ParamType::Str)]),
    ])
    .unwrap();

    let query = parse_aggregation("f('a')", &catalog, &[]).await.unwrap();
    assert_eq!(query.root, FunctionCall::new("f", vec![Value::str("a")]));

    let err = iql_error(parse_aggregation("f('a') and g('b')", &catalog, &[]).await);
    match err {
        IqlError::UnsupportedSyntax { kind, snippet, .. } => {
            assert!(kind.contains("and"));
            assert_eq!(snippet.text, "f('a') and g('b')");
        }
        other => panic!("unexpected error {:?}", other),
    }

    let err = iql_error(parse_aggregation("NOT f('a')", &catalog, &[]).await);
    assert!(matches!(err, IqlError::UnsupportedSyntax { ref kind, .. } if kind.contains("not")));
}

#[tokio::test]
async fn test_multiline_call() {
    let root = filter("filter_by_name([\n    'John',\n    'Anne',\n])\n").await.unwrap();
    assert_eq!(
        root,
        call("filter_by_name", vec![Value::List(vec![Value::str("John"), Value::str("Anne")])])
    );
}

#[tokio::test]
async fn test_comment_inside_multiline_call() {
    let root = filter("filter_by_range(1,  # low\n  2)  # range\n").await.unwrap();
    assert_eq!(root, call("filter_by_range", vec![Value::Int(1), Value::Int(2)]));

    let root = filter("filter_by_name([\n    'John',  # first\n    'Anne',\n])").await.unwrap();
    assert_eq!(
        root,
        call("filter_by_name", vec![Value::List(vec![Value::str("John"), Value::str("Anne")])])
    );
}

#[tokio::test]
async fn test_deep_nesting_parses_in_linear_time() {
    let depth = 20;
    let mut param = ParamType::Int;
    let mut expected = Value::Int(1);
    for _ in 0..depth {
        param = ParamType::list(param);
        expected = Value::List(vec![expected]);
    }
    let catalog = Catalog::new(vec![ExposedFunction::new("h", vec![Parameter::new("x", param)])]).unwrap();

    let source = format!("h({}1{})", "[".repeat(depth), "]".repeat(depth));
    let started = Instant::now();
    let query = parse_filter(&source, &catalog, &[]).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());
    assert_eq!(query.root, call("h", vec![expected]));

    let source = format!("{}filter_by_range(1, 2", "(".repeat(depth));
    let started = Instant::now();
    let err = iql_error(filter(&source).await);
    assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());
    assert!(matches!(err, IqlError::Syntax { .. }));

    let source = format!("{}filter_by_age(1){}", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(filter(&source).await.unwrap(), call("filter_by_age", vec![Value::Int(1)]));
}

#[tokio::test]
async fn test_tuples_and_comprehensions_are_told_apart() {
    let root = filter("filter_by_name(('John',))").await.unwrap();
    assert_eq!(root, call("filter_by_name", vec![Value::List(vec![Value::str("John")])]));

    let err = iql_error(filter("filter_by_name(('John'))").await);
    assert!(matches!(err, IqlError::ArgumentValidation { .. }), "{:?}", err);

    let err = iql_error(filter("(filter_by_age(1), filter_by_age(2))").await);
    assert!(matches!(err, IqlError::UnsupportedSyntax { ref kind, .. } if kind == "Tuple"));

    let err = iql_error(filter("[filter_by_age(a) for a in ages]").await);
    assert!(matches!(err, IqlError::UnsupportedSyntax { ref kind, .. } if kind == "ListComp"));
}

#[tokio::test]
async fn test_overflowing_float_rejected() {
    for source in ["filter_by_score(1e999)", "filter_by_score(-1e999)"] {
        let err = iql_error(filter(source).await);
        assert!(matches!(err, IqlError::ArgumentParsing { .. }), "{} -> {:?}", source, err);
    }
}

#[tokio::test]
async fn test_parsing_is_deterministic() {
    let source = "filter_by_city('x') or not (filter_by_age(1) and filter_by_range(1, 2))";
    let first = filter(source).await.unwrap();
    for _ in 0..5 {
        assert_eq!(filter(source).await.unwrap(), first);
    }
}

#[tokio::test]
async fn test_rendered_tree_reparses_to_same_tree() {
    let catalog = people_catalog();
    let home = Context::new("home", "City", json!(null));
    let contexts = vec![home];
    for source in [
        "not (filter_by_name(['John','Anne']) and filter_by_city('cracow'))",
        "filter_by_city(\"O'Hara\\n\") or filter_by_score(2) and not filter_by_range(-1, 3)",
        "filter_by_age(1) and (filter_by_age(2) and filter_by_home(home))",
        "filter_by_manager(None) or filter_by_home(12)",
    ] {
        let first = parse_filter(source, &catalog, &contexts).await.unwrap().root;
        let rendered = first.to_string();
        let second = parse_filter(&rendered, &catalog, &contexts).await.unwrap().root;
        assert_eq!(first, second, "{} rendered as {}", source, rendered);
    }

    let agg = Catalog::new(vec![ExposedFunction::new(
        "mean",
        vec![
            Parameter::new("columns", ParamType::list(ParamType::Str)),
            Parameter::new("weight", ParamType::Float),
            Parameter::new("flag", ParamType::Bool),
        ],
    )])
    .unwrap();
    let call = parse_aggregation("mean(['a', 'b'], 1, True)", &agg, &[]).await.unwrap().root;
    let again = parse_aggregation(&call.to_string(), &agg, &[]).await.unwrap().root;
    assert_eq!(call, again);
}

/// Index that maps a fixed set of spellings and sleeps longer for earlier entries.
/// Tracks how many lookups overlap and how many ran to completion.
#[derive(Default)]
struct StubIndex {
    fail: bool,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
}

#[async_trait]
impl SimilarityIndex for StubIndex {
    fn name(&self) -> &str {
        "stub"
    }

    async fn similar(&self, text: &str) -> Result<Option<String>, SimilarityError> {
        if self.fail {
            return Err(SimilarityError::Unavailable {
                index: "stub".to_string(),
                message: "connection refused".to_string(),
            });
        }
        let (delay, found) = match text {
            "cracow" => (30, Some("Kraków")),
            "warsaw" => (20, Some("Warsaw")),
            "gdansk" => (10, Some("Gdańsk")),
            _ => (5, None),
        };
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(found.map(str::to_string))
    }
}

fn city_catalog(fail: bool) -> (Catalog, Arc<StubIndex>) {
    let stub = Arc::new(StubIndex {
        fail,
        ..StubIndex::default()
    });
    let index: Arc<dyn SimilarityIndex> = stub.clone();
    let catalog = Catalog::new(vec![
        ExposedFunction::new(
            "filter_by_city",
            vec![Parameter::new("city", ParamType::Str).with_similarity(index.clone())],
        ),
        ExposedFunction::new(
            "filter_by_cities",
            vec![Parameter::new("cities", ParamType::list(ParamType::Str)).with_similarity(index)],
        ),
    ])
    .unwrap();
    (catalog, stub)
}

#[tokio::test]
async fn test_similarity_substitution_keeps_order() {
    let (catalog, stub) = city_catalog(false);
    let query = parse_filter(
        "filter_by_cities(['cracow', 'warsaw', 'gdansk', 'lisbon']) or filter_by_city('cracow')",
        &catalog,
        &[],
    )
    .await
    .unwrap();
    assert_eq!(
        query.root,
        Node::Or {
            children: vec![
                call(
                    "filter_by_cities",
                    vec![Value::List(vec![
                        Value::str("Kraków"),
                        Value::str("Warsaw"),
                        Value::str("Gdańsk"),
                        Value::str("lisbon"),
                    ])],
                ),
                call("filter_by_city", vec![Value::str("Kraków")]),
            ],
        }
    );
    assert_eq!(query.source, "filter_by_cities(['cracow', 'warsaw', 'gdansk', 'lisbon']) or filter_by_city('cracow')");

    // all five lookups were pending at once
    assert_eq!(stub.peak.load(Ordering::SeqCst), 5);
    assert_eq!(stub.completed.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_sibling_lookups_overlap() {
    let (catalog, _) = city_catalog(false);
    let started = Instant::now();
    parse_filter(
        "filter_by_cities(['cracow', 'cracow', 'cracow', 'cracow', 'cracow', 'cracow'])",
        &catalog,
        &[],
    )
    .await
    .unwrap();
    // six sequential lookups would take at least 180ms
    assert!(started.elapsed() < Duration::from_millis(150), "{:?}", started.elapsed());
}

#[tokio::test]
async fn test_similarity_failure_is_not_an_iql_error() {
    let (catalog, _) = city_catalog(true);
    let result = parse_filter("filter_by_city('cracow')", &catalog, &[]).await;
    assert!(matches!(result, Err(ParseError::Similarity(_))));
}

#[tokio::test]
async fn test_sibling_failure_short_circuits() {
    let (catalog, stub) = city_catalog(false);
    let result = parse_filter("filter_by_city('cracow') and filter_by_city(nowhere)", &catalog, &[]).await;
    let err = iql_error(result);
    assert!(matches!(err, IqlError::ContextNotAllowed { .. }));
    assert_eq!(err.snippet().map(|s| s.text.as_str()), Some("nowhere"));

    // the pending lookup was started, then dropped without finishing
    assert_eq!(stub.peak.load(Ordering::SeqCst), 1);
    assert_eq!(stub.completed.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stub.completed.load(Ordering::SeqCst), 0);
}
