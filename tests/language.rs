use forkscript::{
    diagnostics::Result, stdlib::standard_functions, ErrorKind, FunctionTable, ScriptEngine,
    ScriptError, Value, VariableStore,
};

fn fresh() -> ScriptEngine {
    ScriptEngine::new(FunctionTable::new().into_shared(), VariableStore::new())
        .expect("empty engine")
}

fn run(code: &str) -> ScriptEngine {
    let mut engine = fresh();
    engine.execute(code).expect("execution should succeed");
    engine
}

fn var(engine: &ScriptEngine, name: &str) -> Value {
    engine
        .variables()
        .get(name)
        .cloned()
        .unwrap_or_else(|| panic!("variable `{name}` missing"))
}

fn error(code: &str) -> ScriptError {
    match fresh().execute(code) {
        Ok(()) => panic!("expected `{code}` to fail"),
        Err(err) => err,
    }
}

fn eval(expression: &str) -> String {
    let mut engine = fresh();
    let value: Result<Value> = engine.evaluate(expression);
    format!("{:?}", value.expect("evaluation should succeed"))
}

#[test]
fn arithmetic_follows_precedence() {
    assert_eq!(eval("1 + 2 * 3"), "7");
    assert_eq!(eval("(1 + 2) * 3"), "9");
    assert_eq!(eval("10 - 4 - 3"), "3");
    assert_eq!(eval("7 % 3"), "1");
    assert_eq!(eval("-7 % 3"), "-1");
    assert_eq!(eval("-2 * -2"), "4");
    assert_eq!(eval("0x1F + 1_000"), "1031");
    assert_eq!(eval("1.5e3"), "1500");
}

#[test]
fn plus_concatenates_strings() {
    assert_eq!(eval("'1' + 2"), "\"12\"");
    assert_eq!(eval("1 + 2 + '3'"), "\"33\"");
    assert_eq!(eval("'a' + null"), "\"anull\"");
    assert_eq!(eval("[1, 2] + ''"), "\"1,2\"");
    assert_eq!(eval("true + 1"), "2");
    assert_eq!(eval("'6' * '7'"), "42");
}

#[test]
fn equality_is_loose_or_strict() {
    assert_eq!(eval("1 == '1'"), "true");
    assert_eq!(eval("1 === '1'"), "false");
    assert_eq!(eval("null == undefined"), "true");
    assert_eq!(eval("null === undefined"), "false");
    assert_eq!(eval("0 == false"), "true");
    assert_eq!(eval("'' != 0"), "false");
    assert_eq!(eval("[1] === [1]"), "false");

    let mut engine = run("let list = [1]; same = list === list; copy = [1] == [1]");
    assert_eq!(var(&engine, "same"), Value::bool(true));
    assert_eq!(var(&engine, "copy"), Value::bool(false));
    assert!(engine.boolean("'b' > 'a' && 'B' < 'a' && 10 > 9 && '10' < '9'").unwrap());
}

#[test]
fn logical_operators_short_circuit() {
    let mut engine = fresh();
    assert_eq!(engine.string("${0 || 'fallback'}").unwrap(), "fallback");
    assert_eq!(engine.string("${'first' && 'second'}").unwrap(), "second");
    assert_eq!(engine.string("${0 ?? 'unused'}").unwrap(), "0");
    assert_eq!(engine.string("${missing ?? 'default'}").unwrap(), "default");
    assert!(!engine.boolean("false && explode()").unwrap());
    assert!(engine.boolean("true || explode()").unwrap());
    assert_eq!(
        engine.execute("explode()").unwrap_err().to_string(),
        "explode is not a function"
    );
}

#[test]
fn conditional_and_typeof() {
    assert_eq!(eval("1 < 2 ? 'yes' : 'no'"), "\"yes\"");
    assert_eq!(eval("typeof 1"), "\"number\"");
    assert_eq!(eval("typeof 'a'"), "\"string\"");
    assert_eq!(eval("typeof null"), "\"object\"");
    assert_eq!(eval("typeof [1]"), "\"object\"");
    assert_eq!(eval("typeof missing"), "\"undefined\"");
    assert_eq!(eval("!0"), "true");
}

#[test]
fn compound_assignment_and_updates() {
    let engine = run(
        r#"
        a = 10
        a += 5
        a -= 1
        a *= 2
        a /= 4
        a %= 4
        b = 1
        c = b++
        d = ++b
        e = b--
        s = 'x'
        s += 1
        "#,
    );
    assert_eq!(var(&engine, "a"), Value::number(3.0));
    assert_eq!(var(&engine, "b"), Value::number(2.0));
    assert_eq!(var(&engine, "c"), Value::number(1.0));
    assert_eq!(var(&engine, "d"), Value::number(3.0));
    assert_eq!(var(&engine, "e"), Value::number(3.0));
    assert_eq!(var(&engine, "s"), Value::string("x1"));
}

#[test]
fn if_else_chains() {
    let engine = run(
        r#"
        score = 72
        if (score >= 90) { grade = 'A' }
        else if (score >= 70) { grade = 'B' }
        else grade = 'C'
        "#,
    );
    assert_eq!(var(&engine, "grade"), Value::string("B"));
}

#[test]
fn while_loops_with_break_and_continue() {
    let engine = run(
        r#"
        let i = 0
        total = 0
        while (true) {
            i++
            if (i > 10) break
            if (i % 2 == 0) continue
            total += i
        }
        "#,
    );
    assert_eq!(var(&engine, "total"), Value::number(25.0));
    assert!(!engine.variables().contains("i"));
}

#[test]
fn break_outside_loop_is_rejected() {
    assert_eq!(error("break").to_string(), "Illegal break statement");
    assert_eq!(error("if (true) { continue }").kind(), ErrorKind::Runtime);
}

#[test]
fn block_scopes_shadow_and_expire() {
    let engine = run(
        r#"
        let x = 'outer'
        {
            let x = 'inner'
            seenInside = x
            var hoisted = 1
        }
        seenOutside = x
        sawHoisted = hoisted
        "#,
    );
    assert_eq!(var(&engine, "seenInside"), Value::string("inner"));
    assert_eq!(var(&engine, "seenOutside"), Value::string("outer"));
    assert_eq!(var(&engine, "sawHoisted"), Value::number(1.0));
    assert!(!engine.variables().contains("x"));
    assert!(!engine.variables().contains("hoisted"));
}

#[test]
fn locals_do_not_survive_between_executions() {
    let mut engine = fresh();
    engine.execute("let counter = 5").unwrap();
    engine.execute("counter = 1").unwrap();
    assert_eq!(var(&engine, "counter"), Value::number(1.0));
    engine.execute("let counter = 9").unwrap();
    assert_eq!(var(&engine, "counter"), Value::number(1.0));
}

#[test]
fn redeclaration_is_rejected() {
    let err = error("let a = 1; let a = 2");
    assert_eq!(err.to_string(), "Identifier 'a' has already been declared");
    assert!(fresh().execute("var b = 1; var b = 2").is_ok());
}

#[test]
fn local_delete_reports_false() {
    let engine = run("let keep = 1; removed = delete keep; value = keep");
    assert_eq!(var(&engine, "removed"), Value::bool(false));
    assert_eq!(var(&engine, "value"), Value::number(1.0));
}

#[test]
fn objects_and_arrays_are_updated_in_place() {
    let engine = run(
        r#"
        player = { name: 'ada', stats: { hp: 10 }, bag: [] }
        player.stats.hp -= 3
        player['level'] = 2
        player.bag[2] = 'key'
        let name = 'shorthand'
        extra = { name, 'quoted key': true, 7: 'seven' }
        "#,
    );
    let player = var(&engine, "player");
    let player = player.as_object().expect("player is an object");
    assert_eq!(
        player.get("stats").and_then(|stats| stats.as_object()?.get("hp").cloned()),
        Some(Value::number(7.0))
    );
    assert_eq!(player.get("level"), Some(&Value::number(2.0)));
    let bag = player.get("bag").and_then(Value::as_array).expect("bag");
    assert_eq!(
        bag,
        &[Value::undefined(), Value::undefined(), Value::string("key")][..]
    );

    let extra = var(&engine, "extra");
    let keys: Vec<&str> = extra
        .as_object()
        .expect("extra is an object")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, ["name", "quoted key", "7"]);
}

#[test]
fn missing_members_read_undefined() {
    let mut engine = run("o = { a: 1 }; list = [1, 2]");
    assert!(engine.evaluate("o.b").unwrap().is_undefined());
    assert!(engine.evaluate("list[5]").unwrap().is_undefined());
    assert!(engine.evaluate("list.first").unwrap().is_undefined());
    assert_eq!(engine.number("list.length + 'abc'.length").unwrap(), 5.0);
    assert_eq!(engine.string("${'abc'[1]}").unwrap(), "b");
}

#[test]
fn nullish_member_access_fails() {
    assert_eq!(
        error("x = missing.field").to_string(),
        "Cannot read properties of undefined (reading 'field')"
    );
    assert_eq!(
        error("n = null; n.field = 1").to_string(),
        "Cannot set properties of null (setting 'field')"
    );
    assert_eq!(error("n = null; n[0]").to_string(), "Cannot read properties of null (reading '0')");
}

#[test]
fn delete_removes_members() {
    let engine = run(
        r#"
        o = { a: 1, b: 2 }
        delete o.a
        list = [1, 2, 3]
        delete list[1]
        "#,
    );
    let o = var(&engine, "o");
    assert_eq!(o.as_object().map(|map| map.len()), Some(1));
    assert_eq!(
        var(&engine, "list"),
        Value::array(vec![Value::number(1.0), Value::undefined(), Value::number(3.0)])
    );
}

#[test]
fn template_literals_in_code() {
    let engine = run("let who = 'world'; greeting = `hello ${who}, ${1 + 1} times`");
    assert_eq!(var(&engine, "greeting"), Value::string("hello world, 2 times"));

    let mut engine = fresh();
    assert_eq!(engine.string("nested ${`in${'ner'}`}").unwrap(), "nested inner");
    assert_eq!(engine.string("line\\nbreak").unwrap(), "line\nbreak");
}

#[test]
fn comments_and_semicolons_are_optional() {
    let engine = run(
        r#"
        // leading comment
        a = 1; b = 2
        /* block
           comment */ c = a + b;;
        "#,
    );
    assert_eq!(var(&engine, "c"), Value::number(3.0));
}

#[test]
fn value_methods_do_not_mutate() {
    let mut engine = run("name = ' Ada '; list = [3, 1, 2]");
    assert_eq!(engine.string("${name.trim().toUpperCase()}").unwrap(), "ADA");
    assert_eq!(engine.string("${list.slice(1).join('-')}").unwrap(), "1-2");
    assert_eq!(engine.string("${list.concat([4], 5)}").unwrap(), "3,1,2,4,5");
    assert!(engine.boolean("list.includes(2) && name.includes('da')").unwrap());
    assert_eq!(engine.number("list.indexOf(2)").unwrap(), 2.0);
    assert_eq!(engine.string("${(2.345).toFixed(1)}").unwrap(), "2.3");
    assert_eq!(engine.string("${name}|${list}").unwrap(), " Ada |3,1,2");
    assert_eq!(
        engine.execute("list.push(4)").unwrap_err().to_string(),
        "list.push is not a function"
    );
}

#[test]
fn standard_functions_are_arity_checked() {
    let mut engine =
        ScriptEngine::new(standard_functions().into_shared(), VariableStore::new()).unwrap();
    assert_eq!(engine.number("max(1, 7, 3) + min(4, 2)").unwrap(), 9.0);
    assert_eq!(engine.number("len('four') + len([1]) + len({ a: 1 })").unwrap(), 6.0);
    assert_eq!(engine.number("round(2.5) + floor(1.9) + ceil(0.1) + abs(-1)").unwrap(), 6.0);

    let err = engine.execute("abs(1, 2)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert_eq!(
        err.to_string(),
        "function `abs` expected 1 arguments but received 2"
    );
}

#[test]
fn syntax_errors_carry_spans() {
    let err = error("a = 1\nb = )");
    assert_eq!(err.kind(), ErrorKind::Syntax);
    let span = err.span().expect("syntax errors have spans");
    assert_eq!(span.start, 10);

    assert_eq!(error("'unterminated").kind(), ErrorKind::Syntax);
    assert_eq!(error("1 = 2").kind(), ErrorKind::Syntax);
    assert_eq!(fresh().string("${}").unwrap_err().kind(), ErrorKind::Syntax);
}

#[test]
fn array_writes_are_bounded() {
    let mut engine = run("a = [1]");
    for code in ["a[1e18] = 1", "a[4294967295] = 1"] {
        let err = engine.execute(code).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.to_string(), "Invalid array length");
    }
    let err = engine.execute("a[1000000] = 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert_eq!(var(&engine, "a"), Value::array(vec![Value::number(1.0)]));

    engine.execute("a[3] = 4").unwrap();
    assert_eq!(engine.string("${a}|${a.length}").unwrap(), "1,,,4|4");
}

#[test]
fn member_targets_evaluate_keys_once() {
    let mut engine = run(
        r#"
        a = [0, 0, 0]
        i = 0
        a[i++] += 1
        b = [0, 0]
        j = 0
        b[j++]++
        m = [[0], [0], [0]]
        k = 0
        m[k++][0] = 5
        d = [1, 2, 3]
        n = 0
        delete d[n++]
        "#,
    );
    assert_eq!(engine.string("${a}|${i}").unwrap(), "1,0,0|1");
    assert_eq!(engine.string("${b}|${j}").unwrap(), "1,0|1");
    assert_eq!(engine.string("${m}|${k}").unwrap(), "5,0,0|1");
    assert_eq!(engine.string("${d}|${n}").unwrap(), ",2,3|1");
}

#[test]
fn writes_through_nested_paths_keep_siblings() {
    let mut engine = run(
        r#"
        let grid = { rows: [[1, 2], [3, 4]], name: 'g' }
        grid.rows[1][0] *= 10
        out = grid
        "#,
    );
    assert_eq!(engine.string("${out.rows}|${out.name}").unwrap(), "1,2,30,4|g");
    assert_eq!(
        engine.execute("u = {}; u.missing.deep = 1").unwrap_err().to_string(),
        "Cannot set properties of undefined (setting 'deep')"
    );
}

#[test]
fn identifiers_accept_unicode_letters() {
    let engine = run("é = 1; naïve = é + 1; 名前 = 'x'");
    assert_eq!(var(&engine, "é"), Value::number(1.0));
    assert_eq!(var(&engine, "naïve"), Value::number(2.0));
    assert_eq!(var(&engine, "名前"), Value::string("x"));
}

#[test]
fn rounding_matches_number_semantics() {
    let mut engine =
        ScriptEngine::new(standard_functions().into_shared(), VariableStore::new()).unwrap();
    assert_eq!(engine.number("round(0.49999999999999994)").unwrap(), 0.0);
    assert_eq!(engine.number("round(2.5)").unwrap(), 3.0);
    assert_eq!(engine.number("round(-2.5)").unwrap(), -2.0);
    assert_eq!(engine.number("round(-2.6)").unwrap(), -3.0);

    assert_eq!(engine.string("${(2.5).toFixed(0)}").unwrap(), "3");
    assert_eq!(engine.string("${(-1.5).toFixed(0)}").unwrap(), "-2");
    assert_eq!(engine.string("${(1.005).toFixed(2)}").unwrap(), "1.00");
    assert_eq!(engine.string("${(9.999).toFixed(2)}").unwrap(), "10.00");
    assert_eq!(engine.string("${(0).toFixed(2)}").unwrap(), "0.00");
    assert_eq!(engine.string("${(1e21).toFixed(2)}").unwrap(), "1e+21");
    assert_eq!(engine.string("${(-1.5e21).toFixed(1)}").unwrap(), "-1.5e+21");
}
