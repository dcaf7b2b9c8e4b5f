//! Parse-to-run integration tests covering the language's documented
//! end-to-end scenarios: arithmetic, recursion, globals, list literals,
//! unbound natives, and binary codec round-trips.

use pretty_assertions::assert_eq;

use pulsar::binary::{read_module, write_byte_code, ReadSettings, WriteSettings};
use pulsar::interpreter::{ExecutionContext, RuntimeState};
use pulsar::list::ValueList;
use pulsar::module::Module;
use pulsar::optimizer::{optimize, Exports};
use pulsar::parser::{ParseErrorKind, Parser, ParserSettings};
use pulsar::value::Value;

fn parse(source: &str) -> Module {
    let mut parser = Parser::new(&ParserSettings::default());
    parser.add_source("", source);
    let mut module = Module::new();
    parser.parse_into_module(&mut module, &ParserSettings::default()).unwrap();
    module
}

/// `main`'s conventional sole parameter: an empty list, per the entry point's
/// documented `args = []` calling convention.
fn no_args() -> Value {
    Value::List(ValueList::new())
}

#[test]
fn addition_returns_three() {
    let module = parse("* (main args) -> 1: 1 2 + .");
    let mut ctx = ExecutionContext::new(&module);
    ctx.push(no_args());
    assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
    assert_eq!(ctx.root_stack, vec![Value::Integer(3)]);
}

#[test]
fn recursive_factorial_of_five() {
    let module = parse("* (fact n) -> 1: if n <= 1: 1 else n 1 - (fact) n * end .");
    let mut ctx = ExecutionContext::new(&module);
    ctx.push(Value::Integer(5));
    assert_eq!(ctx.call_function_by_name("fact"), RuntimeState::Ok);
    assert_eq!(ctx.root_stack, vec![Value::Integer(120)]);
}

#[test]
fn global_read_and_constant_write_rejection() {
    let module = parse("global 42 -> answer\n* (main args) -> 1: answer .");
    let mut ctx = ExecutionContext::new(&module);
    ctx.push(no_args());
    assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
    assert_eq!(ctx.root_stack, vec![Value::Integer(42)]);

    let err = {
        let mut parser = Parser::new(&ParserSettings::default());
        parser.add_source("", "global const 42 -> answer\n* (main args) -> 1: 0 -> answer .");
        let mut module = Module::new();
        parser.parse_into_module(&mut module, &ParserSettings::default()).unwrap_err()
    };
    assert_eq!(err.kind, ParseErrorKind::WritingToConstantGlobal);
}

#[test]
fn list_literal_folds_constant_runs_and_splices_the_local() {
    let module = parse("* (main x) -> 1: [1, 2, 3, x, 4, 5] .");
    let mut ctx = ExecutionContext::new(&module);
    ctx.push(Value::Integer(99));
    assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
    let Value::List(list) = &ctx.root_stack[0] else { panic!("expected a list") };
    let items: Vec<Value> = list.into_iter().cloned().collect();
    assert_eq!(
        items,
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(3), Value::Integer(99), Value::Integer(4), Value::Integer(5)]
    );
    // Two distinct constant runs, [1,2,3] and [4,5], each added once.
    assert_eq!(module.constants.len(), 2);
}

#[test]
fn unbound_native_function_faults() {
    let module = parse("* (*println line) -> 0.\n* (main args) -> 0: (*println) .");
    let mut ctx = ExecutionContext::new(&module);
    ctx.push(no_args());
    assert_eq!(ctx.call_function_by_name("main"), RuntimeState::UnboundNativeFunction);
}

#[test]
fn binary_codec_round_trips_a_parsed_module_with_debug_symbols() {
    let mut settings = ParserSettings::default();
    settings.debug_symbols = true;
    let mut parser = Parser::new(&settings);
    parser.add_source("main.ps", "* (main args) -> 1: \"hello\" .");
    let mut module = Module::new();
    parser.parse_into_module(&mut module, &settings).unwrap();

    let bytes = write_byte_code(&module, &WriteSettings::default());
    let back = read_module(&bytes, &ReadSettings::default()).unwrap();

    assert_eq!(back.functions.len(), 1);
    assert_eq!(back.functions[0].name, "main");
    assert_eq!(back.functions[0].code, module.functions[0].code);
    assert!(back.functions[0].debug_symbol.is_some());
    assert_eq!(back.source_debug_symbols.len(), 1);
    assert_eq!(back.source_debug_symbols[0].path, "main.ps");

    let mut ctx = ExecutionContext::new(&back);
    ctx.push(no_args());
    assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
    assert_eq!(ctx.root_stack, vec![Value::String(b"hello".to_vec())]);
}

#[test]
fn if_else_falls_through_to_the_right_branch_only() {
    let module = parse("* (pick n) -> 1: if n <= 1: 1 else 2 end .");

    let mut then_ctx = ExecutionContext::new(&module);
    then_ctx.push(Value::Integer(1));
    assert_eq!(then_ctx.call_function_by_name("pick"), RuntimeState::Ok);
    assert_eq!(then_ctx.root_stack, vec![Value::Integer(1)]);

    let mut else_ctx = ExecutionContext::new(&module);
    else_ctx.push(Value::Integer(2));
    assert_eq!(else_ctx.call_function_by_name("pick"), RuntimeState::Ok);
    assert_eq!(else_ctx.root_stack, vec![Value::Integer(2)]);
}

#[test]
fn redeclaring_a_mutable_global_updates_the_same_slot() {
    let module = parse("global 1 -> x\nglobal 2 -> x\n* (main args) -> 1: x .");
    assert_eq!(module.globals.len(), 1, "redeclaration must not leave an orphaned slot");
    let mut ctx = ExecutionContext::new(&module);
    ctx.push(no_args());
    assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
    assert_eq!(ctx.root_stack, vec![Value::Integer(2)]);
}

#[test]
fn if_condition_comparing_doubles_branches_correctly() {
    let module = parse("* (main x) -> 1: if x < 2.0: 1 else 2 end .");

    let mut below = ExecutionContext::new(&module);
    below.push(Value::Double(1.0));
    assert_eq!(below.call_function_by_name("main"), RuntimeState::Ok);
    assert_eq!(below.root_stack, vec![Value::Integer(1)]);

    let mut above = ExecutionContext::new(&module);
    above.push(Value::Double(3.0));
    assert_eq!(above.call_function_by_name("main"), RuntimeState::Ok);
    assert_eq!(above.root_stack, vec![Value::Integer(2)]);
}

#[test]
fn floor_and_ceil_convert_double_to_integer() {
    let module = parse("* (main args) -> 2: 2.7 (!Floor) 2.2 (!Ceil) .");
    let mut ctx = ExecutionContext::new(&module);
    ctx.push(no_args());
    assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
    assert_eq!(ctx.root_stack, vec![Value::Integer(2), Value::Integer(3)]);
}

#[test]
fn compare_pushes_numeric_difference_not_a_bare_sign() {
    let module = parse("* (main args) -> 1: 5 2 (!Compare) .");
    let mut ctx = ExecutionContext::new(&module);
    ctx.push(no_args());
    assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
    assert_eq!(ctx.root_stack, vec![Value::Integer(3)]);
}

#[test]
fn optimizer_preserves_behavior_of_exported_functions() {
    const SOURCE: &str = "* (helper n) -> 1: n 1 + .\n\
         * (dead n) -> 1: n 2 * .\n\
         * (main args) -> 1: 41 (helper) .";

    let unoptimized = parse(SOURCE);
    let mut before = ExecutionContext::new(&unoptimized);
    before.push(no_args());
    assert_eq!(before.call_function_by_name("main"), RuntimeState::Ok);

    let mut optimized = parse(SOURCE);
    optimize(&mut optimized, &Exports::new(&["main"], &[], &[]));
    assert_eq!(optimized.functions.len(), 2, "dead should have been pruned");

    let mut after = ExecutionContext::new(&optimized);
    after.push(no_args());
    assert_eq!(after.call_function_by_name("main"), RuntimeState::Ok);
    assert_eq!(before.root_stack, after.root_stack);
}
