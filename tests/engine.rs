use std::rc::Rc;

use forkscript::{
    diagnostics::Result, ErrorKind, FunctionTable, ScriptEngine, ScriptError, TypeNamespace,
    TypeTag, Value, VariableStore,
};

fn fresh(variables: VariableStore) -> ScriptEngine {
    ScriptEngine::new(FunctionTable::new().into_shared(), variables).expect("valid engine")
}

fn double(args: &[Value]) -> Result<Value> {
    Ok(Value::number(args[0].to_number() * 2.0))
}

fn counter() -> impl FnMut(&[Value]) -> Result<Value> + Clone + 'static {
    let mut count = 0.0;
    move |_: &[Value]| {
        count += 1.0;
        Ok(Value::number(count))
    }
}

fn expect_err<T: std::fmt::Debug>(result: Result<T>) -> ScriptError {
    match result {
        Ok(value) => panic!("expected error, received {value:?}"),
        Err(err) => err,
    }
}

#[test]
fn rejects_reserved_word_as_function_name() {
    let functions = FunctionTable::new().with("Boolean", double).into_shared();
    let err = expect_err(ScriptEngine::new(functions, VariableStore::new()));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(
        err.to_string(),
        "Reserved word \"Boolean\" cannot be used as a function."
    );
}

#[test]
fn rejects_reserved_word_as_variable_name() {
    let variables = VariableStore::new().with("Boolean", true);
    let err = expect_err(ScriptEngine::new(FunctionTable::new().into_shared(), variables));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(
        err.to_string(),
        "Reserved word \"Boolean\" cannot be used as a variable."
    );
}

#[test]
fn rejects_name_in_both_functions_and_variables() {
    let functions = FunctionTable::new().with("double", double).into_shared();
    let variables = VariableStore::new().with("double", 2);
    let err = expect_err(ScriptEngine::new(functions, variables));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(
        err.to_string(),
        "Cannot use \"double\" as a variable. It is already in use as a function."
    );
}

#[test]
fn reserved_word_cannot_be_assigned_or_deleted() {
    let mut engine = fresh(VariableStore::new().with("a", 1));
    for _ in 0..2 {
        let err = expect_err(engine.execute("Boolean = 1"));
        assert_eq!(err.kind(), ErrorKind::Assignment);
        assert_eq!(err.to_string(), "Reserved word \"Boolean\" cannot be assigned.");

        let err = expect_err(engine.execute("delete Boolean"));
        assert_eq!(err.kind(), ErrorKind::Deletion);
        assert_eq!(err.to_string(), "Reserved word \"Boolean\" cannot be deleted.");

        engine.execute("a = a + 1; b = 'x'").expect("ordinary writes");
    }
}

#[test]
fn reserved_word_cannot_be_declared_locally() {
    let mut engine = fresh(VariableStore::new());
    let err = expect_err(engine.execute("let Boolean = 1"));
    assert_eq!(
        err.to_string(),
        "Reserved word \"Boolean\" cannot be used as a variable."
    );
}

#[test]
fn boolean_word_resolves_to_conversion_primitive() {
    let mut engine = fresh(VariableStore::new().with("name", ""));
    assert!(engine.boolean("Boolean(1)").unwrap());
    assert!(!engine.boolean("Boolean(name)").unwrap());
    assert!(!engine.boolean("Boolean()").unwrap());
    assert_eq!(engine.string("${typeof Boolean}").unwrap(), "function");
}

#[test]
fn function_names_resolve_to_host_calls() {
    let functions = FunctionTable::new().with("double", double).into_shared();
    let mut engine = ScriptEngine::new(functions, VariableStore::new()).unwrap();
    assert_eq!(engine.number("double(21)").unwrap(), 42.0);
    engine.execute("result = double(double(1))").unwrap();
    assert_eq!(engine.variables().get("result"), Some(&Value::number(4.0)));
}

#[test]
fn assigning_to_function_name_fails() {
    let functions = FunctionTable::new().with("double", double).into_shared();
    let mut engine = ScriptEngine::new(functions, VariableStore::new()).unwrap();
    let err = expect_err(engine.execute("double = 3"));
    assert_eq!(err.kind(), ErrorKind::Assignment);
    assert_eq!(
        err.to_string(),
        "Cannot set a value to the property \"double\". It is already in use as a function."
    );
    assert!(!engine.variables().contains("double"));
}

#[test]
fn unknown_identifiers_read_as_undefined() {
    let mut engine = fresh(VariableStore::new());
    assert!(engine.evaluate("missing").unwrap().is_undefined());
    assert_eq!(engine.string("${typeof missing}").unwrap(), "undefined");
    assert!(!engine.boolean("missing").unwrap());
}

#[test]
fn block_scoped_locals_do_not_leak() {
    let mut engine = fresh(VariableStore::new().with("a", 0));
    engine.execute("let temp = 2; a = temp").unwrap();
    assert!(!engine.variables().contains("temp"));
    assert_eq!(engine.variables().get("a"), Some(&Value::number(2.0)));
    assert!(engine.namespace().get("temp").is_none());
}

#[test]
fn const_locals_reject_reassignment() {
    let mut engine = fresh(VariableStore::new());
    let err = expect_err(engine.execute("const k = 1; k = 2"));
    assert_eq!(err.kind(), ErrorKind::Assignment);
    assert_eq!(err.to_string(), "Assignment to constant variable.");
}

#[test]
fn number_coerces_with_numeric_rules() {
    let mut engine = fresh(VariableStore::new().with("x", 10).with("y", 5));
    assert!(engine.number("invalid").unwrap().is_nan());
    assert_eq!(engine.number("42").unwrap(), 42.0);
    assert_eq!(engine.number("x+y").unwrap(), 15.0);
    assert_eq!(engine.number("' 7 '").unwrap(), 7.0);
    assert_eq!(engine.number("true").unwrap(), 1.0);
    assert_eq!(engine.number("null").unwrap(), 0.0);
    assert!(engine.number("'seven'").unwrap().is_nan());
}

#[test]
fn string_renders_template_bodies() {
    let mut engine = fresh(VariableStore::new().with("x", 42));
    assert_eq!(engine.string("${x}").unwrap(), "42");
    assert_eq!(engine.string("x is ${x}, half is ${x / 2}").unwrap(), "x is 42, half is 21");
    assert_eq!(engine.string("no interpolation").unwrap(), "no interpolation");

    let mut engine = fresh(VariableStore::new());
    assert_eq!(engine.string("${x}").unwrap(), "undefined");

    let values: Vec<Value> = vec![1.into(), 2.into(), 3.into()];
    let mut engine = fresh(VariableStore::new().with("x", values));
    assert_eq!(engine.string("${x}").unwrap(), "1,2,3");
}

#[test]
fn string_uses_default_conversions() {
    let mut engine = fresh(VariableStore::new());
    assert_eq!(engine.string("${null}").unwrap(), "null");
    assert_eq!(engine.string("${true}").unwrap(), "true");
    assert_eq!(engine.string("${{ a: 1 }}").unwrap(), "[object Object]");
    assert_eq!(engine.string("${[1, null, 3]}").unwrap(), "1,,3");
    assert_eq!(engine.string("${0.1 + 0.2}").unwrap(), "0.30000000000000004");
    assert_eq!(engine.string("${1 / 0}").unwrap(), "Infinity");
}

#[test]
fn boolean_reflects_store_changes() {
    let mut engine = fresh(VariableStore::new());
    assert!(!engine.boolean("a == 1").unwrap());
    engine.execute("a = 1").unwrap();
    assert!(engine.boolean("a == 1").unwrap());
    assert!(engine.condition_check("a === 1 && a != 2").unwrap());
}

#[test]
fn deleting_absent_name_is_idempotent() {
    let mut engine = fresh(VariableStore::new().with("a", 1));
    engine.execute("delete a").unwrap();
    assert!(!engine.variables().contains("a"));
    engine.execute("delete a").unwrap();
    engine.execute("delete neverDefined").unwrap();
    assert!(engine.variables().is_empty());
}

#[test]
fn type_mismatch_is_rejected() {
    let mut engine = fresh(VariableStore::new());
    engine.execute("a = 1").unwrap();
    engine.execute("a = 2").unwrap();
    let err = expect_err(engine.execute("a = 'one'"));
    assert_eq!(err.kind(), ErrorKind::Assignment);
    assert_eq!(
        err.to_string(),
        "Type mismatch during variable set. The type of \"a\" is \"number\", and it is tried to set to \"string\"."
    );
    assert_eq!(engine.variables().get("a"), Some(&Value::number(2.0)));
}

#[test]
fn type_survives_deletion() {
    let mut engine = fresh(VariableStore::new());
    engine.execute("a = true; delete a").unwrap();
    let err = expect_err(engine.execute("a = 'back'"));
    assert_eq!(err.kind(), ErrorKind::Assignment);
    assert_eq!(engine.namespace().get("a"), Some(TypeTag::Boolean));
}

#[test]
fn initial_variables_are_not_typed_until_assigned() {
    let mut engine = fresh(VariableStore::new().with("a", 1));
    assert!(engine.namespace().is_empty());
    engine.execute("a = 'text'").unwrap();
    assert_eq!(engine.namespace().get("a"), Some(TypeTag::String));
}

#[test]
fn shared_namespace_enforces_types_across_engines() {
    let namespace = TypeNamespace::new();
    let mut first = ScriptEngine::with_namespace(
        FunctionTable::new().into_shared(),
        VariableStore::new(),
        namespace.clone(),
    )
    .unwrap();
    let mut second = ScriptEngine::with_namespace(
        FunctionTable::new().into_shared(),
        VariableStore::new(),
        namespace.clone(),
    )
    .unwrap();

    first.execute("x = 'hello'").unwrap();
    second.execute("x = 'world'").unwrap();
    let err = expect_err(second.execute("x = 5"));
    assert_eq!(err.kind(), ErrorKind::Assignment);
    let err = expect_err(first.execute("x = [5]"));
    assert_eq!(
        err.to_string(),
        "Type mismatch during variable set. The type of \"x\" is \"string\", and it is tried to set to \"object\"."
    );

    second.execute("y = null").unwrap();
    assert!(first.execute("y = {}").is_ok());
    assert_eq!(namespace.get("y"), Some(TypeTag::Object));
    assert_eq!(namespace.len(), 2);
}

#[test]
fn duplicate_copies_variables_deeply() {
    let mut original = fresh(VariableStore::new());
    original
        .execute("inventory = { items: ['sword'], gold: 10 }")
        .unwrap();
    let mut fork = original.duplicate();

    assert!(fork.variables().deep_equals(original.variables()));
    let (Some(a), Some(b)) = (
        original.variables().get("inventory"),
        fork.variables().get("inventory"),
    ) else {
        panic!("inventory missing");
    };
    assert!(!Rc::ptr_eq(&a.0, &b.0));

    fork.execute("inventory.gold = 0; inventory.items[1] = 'shield'")
        .unwrap();
    assert_eq!(original.number("inventory.gold").unwrap(), 10.0);
    assert_eq!(original.number("inventory.items.length").unwrap(), 1.0);
    assert_eq!(fork.string("${inventory.items}").unwrap(), "sword,shield");
    assert!(!fork.variables().deep_equals(original.variables()));
}

#[test]
fn duplicate_clones_function_state() {
    let functions = FunctionTable::new().with("tick", counter()).into_shared();
    let mut original = ScriptEngine::new(Rc::clone(&functions), VariableStore::new()).unwrap();
    assert_eq!(original.number("tick()").unwrap(), 1.0);

    let mut fork = original.duplicate();
    assert!(!Rc::ptr_eq(&functions, &fork.function_table()));
    assert!(Rc::ptr_eq(&functions, &original.function_table()));
    assert_eq!(
        fork.functions().names().collect::<Vec<_>>(),
        original.functions().names().collect::<Vec<_>>()
    );

    assert_eq!(original.number("tick()").unwrap(), 2.0);
    assert_eq!(original.number("tick()").unwrap(), 3.0);
    assert_eq!(fork.number("tick()").unwrap(), 2.0);
}

#[test]
fn duplicate_shares_namespace() {
    let mut original = fresh(VariableStore::new());
    let mut fork = original.duplicate();
    assert!(fork.namespace().shares_with(original.namespace()));

    fork.execute("score = 1").unwrap();
    assert!(!original.variables().contains("score"));
    let err = expect_err(original.execute("score = 'high'"));
    assert_eq!(err.kind(), ErrorKind::Assignment);
    original.execute("score = 99").unwrap();
    assert_eq!(fork.number("score").unwrap(), 1.0);
}

#[test]
fn runtime_errors_lose_generic_prefix() {
    let functions = FunctionTable::new()
        .with("fail", |_: &[Value]| -> Result<Value> {
            Err(ScriptError::runtime("Error: out of stock"))
        })
        .into_shared();
    let mut engine = ScriptEngine::new(functions, VariableStore::new()).unwrap();
    let err = expect_err(engine.execute("fail()"));
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert_eq!(err.to_string(), "out of stock");
    let ScriptError::Runtime(diag) = err else {
        unreachable!()
    };
    assert!(diag.span.is_some());
    assert_eq!(diag.notes, vec!["raised by host function `fail`".to_string()]);
}

#[test]
fn syntax_errors_are_reported() {
    let mut engine = fresh(VariableStore::new());
    let err = expect_err(engine.execute("a = (1 + "));
    assert_eq!(err.kind(), ErrorKind::Syntax);
    let err = expect_err(engine.number("1 2"));
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(engine.variables().is_empty());
}

#[test]
fn failed_execution_keeps_earlier_writes() {
    let mut engine = fresh(VariableStore::new());
    let err = expect_err(engine.execute("a = 1; b = missing.field; c = 3"));
    assert_eq!(
        err.to_string(),
        "Cannot read properties of undefined (reading 'field')"
    );
    assert!(engine.variables().contains("a"));
    assert!(!engine.variables().contains("b"));
    assert!(!engine.variables().contains("c"));
}

#[test]
fn variables_load_from_json() {
    let json = serde_json::json!({ "hp": 12, "name": "ada", "tags": ["a", "b"] });
    let variables = VariableStore::from_json(&json).unwrap();
    let mut engine = fresh(variables);
    assert_eq!(engine.string("${name} has ${hp} hp").unwrap(), "ada has 12 hp");
    assert_eq!(engine.variables().to_json(), json);

    let err = expect_err(VariableStore::from_json(&serde_json::json!([1, 2])));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
