//! Tests for function calls, return-calls, and call-site result routing

use std::rc::Rc;

use maplit::hashmap;
use serde_json::json;

use crate::execution::{
    check_compound, instantiate_all, resolve_functions, ChainBuilder, CommandError,
    ExecutionContext, ExecutionLimits, ExecutionSource, FunctionId, FunctionRef,
    InstantiationError, ResultCallback,
};

use super::helpers::{
    call_line, context, fail_line, function, id, instantiate, log_line, recorder, return_call_line,
    return_line, CallFunctions, DeepFunction, MapResolver, TestSource,
};

/* ===================== Nesting ===================== */

#[test]
fn test_deep_nesting_uses_no_native_recursion() {
    let depth = 50_000;
    let limits = ExecutionLimits {
        command_limit: 1_000_000,
        ..ExecutionLimits::default()
    };
    let mut ctx: ExecutionContext<TestSource> = ExecutionContext::new(limits);
    let (callback, results) = recorder();

    let top: FunctionRef<TestSource> = Rc::new(DeepFunction::new(0, depth));
    ctx.queue_initial_function_call(instantiate(&top), TestSource::new("C"), callback);
    ctx.run().unwrap();

    assert_eq!(*results.borrow(), vec![(true, depth as i32)]);
    // one call per level plus the bottom leaf
    assert_eq!(ctx.executed_commands(), depth + 2);
}

#[test]
fn test_body_completes_before_callback() {
    let source = TestSource::new("C");
    let inner = function("test:inner", vec![log_line("inner", 1)]);
    let outer = function("test:outer", vec![call_line(vec![inner]), log_line("after", 2)]);

    let log = Rc::clone(&source.log);
    let callback = ResultCallback::new(move |_, result| log.borrow_mut().push(format!("callback {result}")));

    let mut ctx = context();
    ctx.queue_initial_function_call(instantiate(&outer), source.clone(), callback);
    ctx.run().unwrap();

    assert_eq!(source.logged(), vec!["inner@C", "after@C", "callback 2"]);
}

/* ===================== Return-calls ===================== */

fn run_return_call(body: Vec<crate::execution::ContextChain<TestSource>>) -> (Vec<(bool, i32)>, Vec<String>) {
    let source = TestSource::new("C");
    let inner = function("test:inner", body);
    let outer = function(
        "test:outer",
        vec![return_call_line(vec![inner]), log_line("unreachable", 99)],
    );
    let (callback, results) = recorder();

    let mut ctx = context();
    ctx.queue_initial_function_call(instantiate(&outer), source.clone(), callback);
    ctx.run().unwrap();

    let results = results.borrow().clone();
    (results, source.logged())
}

#[test]
fn test_return_call_result_becomes_caller_result() {
    for value in [7, 0, -3] {
        let (results, log) = run_return_call(vec![return_line(value)]);
        assert_eq!(results, vec![(true, value)], "value {value}");
        assert!(log.is_empty());
    }
}

#[test]
fn test_return_call_failure_becomes_caller_failure() {
    let (results, log) = run_return_call(vec![fail_line("nope")]);
    assert_eq!(results, vec![(false, 0)]);
    assert!(log.is_empty());
}

#[test]
fn test_return_call_passes_leaf_result_unchanged() {
    let (results, log) = run_return_call(vec![log_line("U", 42)]);
    assert_eq!(results, vec![(true, 42)]);
    assert_eq!(log, vec!["U@C"]);
}

#[test]
fn test_return_call_of_empty_function_fails_caller() {
    let (results, _) = run_return_call(Vec::new());
    assert_eq!(results, vec![(false, 0)]);
}

#[test]
fn test_explicit_return_discards_rest_of_function() {
    let source = TestSource::new("C");
    let body = function(
        "test:body",
        vec![log_line("a", 1), return_line(3), log_line("b", 1)],
    );
    let (callback, results) = recorder();

    let mut ctx = context();
    ctx.queue_initial_function_call(instantiate(&body), source.clone(), callback);
    ctx.run().unwrap();

    assert_eq!(*results.borrow(), vec![(true, 3)]);
    assert_eq!(source.logged(), vec!["a@C"]);
}

#[test]
fn test_return_run_leaf_returns_its_result() {
    let source = TestSource::new("C");
    let line = ChainBuilder::new("return run value")
        .return_run()
        .executes(|_: &TestSource| Ok(11));
    let body = function("test:body", vec![line, log_line("after", 1)]);
    let (callback, results) = recorder();

    let mut ctx = context();
    ctx.queue_initial_function_call(instantiate(&body), source.clone(), callback);
    ctx.run().unwrap();

    assert_eq!(*results.borrow(), vec![(true, 11)]);
    assert!(source.logged().is_empty());
}

#[test]
fn test_return_run_with_no_sources_fails_frame() {
    let source = TestSource::new("C");
    let line = ChainBuilder::new("return run execute if nothing")
        .return_run()
        .redirect(|_: &TestSource| Ok(Vec::new()))
        .executes(|_: &TestSource| Ok(1));
    let body = function("test:body", vec![line, log_line("after", 1)]);
    let (callback, results) = recorder();

    let mut ctx = context();
    ctx.queue_initial_function_call(instantiate(&body), source.clone(), callback);
    ctx.run().unwrap();

    assert_eq!(*results.borrow(), vec![(false, 0)]);
    assert!(source.logged().is_empty());
}

/* ===================== Call-site policies ===================== */

fn run_call_site(functions: Vec<FunctionRef<TestSource>>, source: TestSource) {
    let chain = ChainBuilder::new("function").custom(CallFunctions::new(functions));
    let mut ctx = context();
    ctx.queue_initial_command(chain, source, ResultCallback::empty());
    ctx.run().unwrap();
}

#[test]
fn test_multiple_calls_with_consumer_aggregate_once() {
    let (callback, results) = recorder();
    let source = TestSource::new("C").with_callback(callback);
    let functions = vec![
        function("test:two", vec![return_line(2)]),
        function("test:three", vec![return_line(3)]),
        function("test:four", vec![return_line(4)]),
    ];

    run_call_site(functions, source);

    assert_eq!(*results.borrow(), vec![(true, 9)]);
}

#[test]
fn test_single_call_passes_result_straight_through() {
    let (callback, results) = recorder();
    let source = TestSource::new("C").with_callback(callback);

    run_call_site(vec![function("test:five", vec![return_line(5)])], source);

    assert_eq!(*results.borrow(), vec![(true, 5)]);
}

#[test]
fn test_multiple_calls_without_consumer_run_independently() {
    let source = TestSource::new("C");
    let functions = vec![
        function("test:a", vec![log_line("a", 1)]),
        function("test:b", vec![log_line("b", 1)]),
    ];

    run_call_site(functions, source.clone());

    assert_eq!(source.logged(), vec!["a@C", "b@C"]);
}

#[test]
fn test_aggregate_skips_functions_without_result() {
    let (callback, results) = recorder();
    let source = TestSource::new("C").with_callback(callback);
    let functions = vec![
        function("test:empty", Vec::new()),
        function("test:four", vec![return_line(4)]),
    ];

    run_call_site(functions, source);

    assert_eq!(*results.borrow(), vec![(true, 4)]);
}

#[test]
fn test_loud_source_is_told_about_function_results() {
    let source = TestSource::new("C").loud();

    run_call_site(vec![function("test:five", vec![return_line(5)])], source.clone());

    assert_eq!(
        *source.reports.borrow(),
        vec![("test:five".to_string(), true, 5)]
    );
}

/* ===================== Instantiation ===================== */

#[test]
fn test_malformed_arguments_fail_instantiation_with_function_id() {
    let source = TestSource::new("C");
    let f = function("test:f", vec![log_line("U", 1)]);
    let chain = ChainBuilder::new("function test:f 5").custom(CallFunctions::with_arguments(vec![f.clone()], json!(5)));

    let mut ctx = context();
    ctx.queue_initial_command(chain, source.clone(), ResultCallback::empty());
    ctx.run().unwrap();

    assert!(source.logged().is_empty());
    let errors = source.errors.borrow();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].1.contains("test:f"), "{}", errors[0].1);

    let Err(CommandError::Instantiation { function, reason }) = instantiate_all(&[f], Some(&json!(5))) else {
        unreachable!("Expected an instantiation error");
    };
    assert_eq!(function, "test:f");
    assert_eq!(reason, InstantiationError::NotCompound { found: "number".to_string() });
}

#[test]
fn test_failed_instantiation_schedules_no_function() {
    let source = TestSource::new("C");
    let good = function("test:good", vec![log_line("good", 1)]);
    let bad = function("test:bad", vec![log_line("bad", 1)]);
    let chain = ChainBuilder::new("function #test:both")
        .custom(CallFunctions::with_arguments(vec![good, bad], json!("not compound")));

    let mut ctx = context();
    ctx.queue_initial_command(chain, source.clone(), ResultCallback::empty());
    ctx.run().unwrap();

    assert!(source.logged().is_empty());
    assert_eq!(source.error_count(), 1);
}

/* ===================== Resolution ===================== */

#[test]
fn test_resolve_function_and_tag() {
    let a = function("test:a", Vec::new());
    let b = function("test:b", Vec::new());
    let resolver = MapResolver {
        functions: hashmap! { id("test:a") => a.clone(), id("test:b") => b.clone() },
        tags: hashmap! { id("test:all") => vec![a, b], id("test:none") => Vec::new() },
    };

    let single = resolve_functions(&resolver, "test:a").unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].id().to_string(), "test:a");

    let tagged = resolve_functions(&resolver, "#test:all").unwrap();
    let ids: Vec<String> = tagged.iter().map(|f| f.id().to_string()).collect();
    assert_eq!(ids, vec!["test:a", "test:b"]);

    assert!(matches!(
        resolve_functions(&resolver, "test:missing"),
        Err(CommandError::UnknownFunction { .. })
    ));
    assert!(matches!(
        resolve_functions(&resolver, "#test:missing"),
        Err(CommandError::UnknownTag { .. })
    ));
    assert!(matches!(
        resolve_functions(&resolver, "#test:none"),
        Err(CommandError::NoFunctions { .. })
    ));
}

#[test]
fn test_function_id_parsing() {
    let parsed = FunctionId::parse("demo:tick/main").unwrap();
    assert_eq!(parsed.namespace(), "demo");
    assert_eq!(parsed.path(), "tick/main");

    let defaulted = FunctionId::parse("load").unwrap();
    assert_eq!(defaulted.to_string(), "minecraft:load");

    assert!(matches!(
        FunctionId::parse("Demo:Main"),
        Err(CommandError::InvalidFunctionId { .. })
    ));
    assert!(FunctionId::parse("demo:").is_err());
}

#[test]
fn test_check_compound_accepts_objects_only() {
    let object = json!({ "n": 3 });
    let map = check_compound(Some(&object)).unwrap().unwrap();
    assert_eq!(map.get("n"), Some(&json!(3)));

    assert!(check_compound(None).unwrap().is_none());

    let list = json!([1, 2]);
    assert!(matches!(
        check_compound(Some(&list)),
        Err(InstantiationError::NotCompound { found }) if found == "list"
    ));
}
