// rule-engine-rs/tests/rule_chain_tests.rs
// Drives the public API the way the repair loop does: apply one fix, check
// the result with the syntax pre-check, then feed the next error back in.

use rule_engine::{validate_syntax, RuleEngine};

#[test]
fn successive_errors_converge_one_rule_at_a_time() {
    let engine = RuleEngine::new();
    let code = "x = 1\nif x > 0\n    print x\n";
    assert!(!validate_syntax(code).valid);

    let first = engine
        .try_fix("SyntaxError: invalid syntax", code)
        .expect("print statement is fixable");
    assert_eq!(first.rule, "print_statement");

    let second = engine
        .try_fix("SyntaxError: expected ':'", &first.code)
        .expect("missing colon is fixable");
    assert_eq!(second.rule, "missing_colon");
    assert_eq!(second.code, "x = 1\nif x > 0:\n    print(x)\n");
    assert!(validate_syntax(&second.code).valid);

    assert!(engine.try_fix("SyntaxError: expected ':'", &second.code).is_none());
}

#[test]
fn guards_keep_the_fixed_code_parseable() {
    let engine = RuleEngine::new();
    let cases = [
        (
            "ZeroDivisionError: division by zero",
            "def ratio(a, b):\n    if a > 0:\n        return a / b\n    return 0\n",
        ),
        (
            "IndexError: list index out of range",
            "def pick(values, i):\n    chosen = values[i]\n    return chosen\n",
        ),
        (
            "ValueError: could not convert string to float: 'n/a'",
            "def parse(text):\n    value = float(text)\n    return value\n",
        ),
        (
            "RecursionError: maximum recursion depth exceeded",
            "def countdown(n):\n    print(n)\n    countdown(n - 1)\n",
        ),
    ];

    for (error, code) in cases {
        let fixed = engine
            .try_fix(error, code)
            .unwrap_or_else(|| panic!("no fix for {}", error));
        assert_ne!(fixed.code, code);
        let check = validate_syntax(&fixed.code);
        assert!(check.valid, "{} produced invalid code: {:?}\n{}", fixed.rule, check.diagnostic, fixed.code);
    }
}

#[test]
fn division_inside_nested_block_is_guarded_in_place() {
    let engine = RuleEngine::new();
    let fixed = engine
        .try_fix(
            "ZeroDivisionError: division by zero",
            "def ratio(a, b):\n    if a > 0:\n        return a / b\n    return 0\n",
        )
        .expect("division is fixable");

    assert_eq!(
        fixed.code,
        "def ratio(a, b):\n    if a > 0:\n        if b == 0:\n            raise ValueError(\"Cannot divide by zero\")\n        return a / b\n    return 0\n"
    );
}
