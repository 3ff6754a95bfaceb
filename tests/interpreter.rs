mod common;

#[cfg(test)]
mod interpreter_tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use typelox::error::RuntimeErrorKind;
    use typelox::interpreter::{Interpreter, InterpreterConfig};
    use typelox::parser::Parser;
    use typelox::resolver::Resolver;
    use typelox::scanner::Scanner;
    use typelox::session::Session;
    use typelox::value::Value;

    use crate::common::{run, run_with_config};

    #[test]
    fn test_division_by_zero_is_math_error() {
        let outcome = run("print(5 / 0);");

        assert_eq!(outcome.stdout, "");
        assert_eq!(outcome.stderr, "MathError: Cannot divide by zero.\n[line 1]\n");
        assert_eq!(outcome.exit_code, Some(70));
    }

    #[test]
    fn test_whole_numbers_print_without_fraction() {
        let outcome = run("print(5 + 0);\nprint(2.5);\nprint(10 / 4);\nprint(-0.5 * 2);");

        assert_eq!(outcome.lines(), vec!["5", "2.5", "2.5", "-1"]);
        assert_eq!(outcome.exit_code, None);
    }

    #[test]
    fn test_string_concatenation_coerces_either_side() {
        let outcome = run("print(\"a\" + 1);\nprint(1 + \"a\");\nprint(\"x\" + true + nil);");

        assert_eq!(outcome.lines(), vec!["a1", "1a", "xtruenil"]);
    }

    #[test]
    fn test_bool_plus_number_is_type_error() {
        // Statically visible: rejected before running.
        let outcome = run("print(true + 1);");
        assert_eq!(outcome.exit_code, Some(65));

        // Hidden behind an untyped return: caught at runtime.
        let outcome = run("fun yes() { return true; }\nprint(yes() + 1);");
        assert_eq!(
            outcome.stderr,
            "TypeError: Operands for '+' must be two numbers or contain a string, but were true and 1 instead.\n[line 2]\n"
        );
        assert_eq!(outcome.exit_code, Some(70));
    }

    #[test]
    fn test_block_shadowing_does_not_leak() {
        let outcome = run("var x = 1; { var x = 2; print(x); } print(x);");

        assert_eq!(outcome.lines(), vec!["2", "1"]);
    }

    #[test]
    fn test_loop_closures_share_initializer_but_not_body_variables() {
        let source = r#"
            var first_i; var second_i; var first_j; var second_j;
            for (var i = 0; i < 2; i = i + 1) {
                var j = i;
                fun read_i() -> number { return i; }
                fun read_j() -> number { return j; }
                if (i == 0) {
                    first_i = read_i;
                    first_j = read_j;
                } else {
                    second_i = read_i;
                    second_j = read_j;
                }
            }
            print(first_i());
            print(second_i());
            print(first_j());
            print(second_j());
        "#;

        let outcome = run(source);
        assert_eq!(outcome.stderr, "");
        assert_eq!(outcome.lines(), vec!["2", "2", "0", "1"]);
    }

    #[test]
    fn test_closures_capture_their_frame() {
        let source = r#"
            fun make_counter() -> () -> number {
                var n = 0;
                fun count() -> number {
                    n = n + 1;
                    return n;
                }
                return count;
            }
            var c1 = make_counter();
            c1();
            print(c1());
            var c2 = make_counter();
            print(c2());
        "#;

        assert_eq!(run(source).lines(), vec!["2", "1"]);
    }

    #[test]
    fn test_closures_see_later_assignments() {
        let source = r#"
            var shared = "before";
            fun show() { print(shared); }
            shared = "after";
            show();
        "#;

        assert_eq!(run(source).lines(), vec!["after"]);
    }

    #[test]
    fn test_recursion() {
        let source = r#"
            fun fib(n: number) -> number {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print(fib(15));
        "#;

        assert_eq!(run(source).lines(), vec!["610"]);
    }

    #[test]
    fn test_missing_field_is_def_error() {
        let outcome = run("class A {}\nvar a = A();\nprint(a.missing);");

        assert_eq!(outcome.stderr, "DefError: Undefined property 'missing'.\n[line 3]\n");
        assert_eq!(outcome.exit_code, Some(70));
    }

    #[test]
    fn test_bound_methods_are_independent() {
        let source = r#"
            class Box {
                init(v: number) { this.v = v; }
                get() -> number { return this.v; }
            }
            var a = Box(1);
            var b = Box(2);
            var ga = a.get;
            var gb = b.get;
            a.v = 10;
            print(ga());
            print(gb());
        "#;

        assert_eq!(run(source).lines(), vec!["10", "2"]);
    }

    #[test]
    fn test_fields_shadow_methods() {
        let source = r#"
            class A { m() -> string { return "method"; } }
            var a = A();
            print(a.m());
            a.m = "field";
            print(a.m);
        "#;

        assert_eq!(run(source).lines(), vec!["method", "field"]);
    }

    #[test]
    fn test_initializer_returns_instance() {
        let source = r#"
            class A {
                init() { this.x = 1; return; }
            }
            var a = A();
            print(a.init());
            print(a.x);
        "#;

        assert_eq!(run(source).lines(), vec!["<instance of <class A>>", "1"]);
    }

    #[test]
    fn test_break_exits_nearest_loop_only() {
        let source = r#"
            var i = 0;
            while (true) {
                {
                    if (i == 3) { break; }
                }
                i = i + 1;
            }
            print(i);

            var outer = 0;
            var total = 0;
            while (outer < 3) {
                outer = outer + 1;
                var inner = 0;
                while (true) {
                    inner = inner + 1;
                    if (inner == 2) break;
                    total = total + 1;
                }
            }
            print(total);
        "#;

        assert_eq!(run(source).lines(), vec!["3", "3"]);
    }

    #[test]
    fn test_return_unwinds_loops() {
        let source = r#"
            fun first_over(limit: number) -> number {
                for (var i = 0; ; i = i + 1) {
                    if (i * i > limit) return i;
                }
            }
            print(first_over(50));
        "#;

        assert_eq!(run(source).lines(), vec!["8"]);
    }

    #[test]
    fn test_super_and_multi_level_inheritance() {
        let source = r#"
            class A {
                name() -> string { return "A"; }
                hello() -> string { return "hello from " + this.name(); }
            }
            class B : A {
                name() -> string { return "B"; }
                greet() -> string { return "B>" + super.name(); }
            }
            class C : B {
                name() -> string { return "C"; }
                greet() -> string { return "C>" + super.greet(); }
            }
            var c = C();
            print(c.hello());
            print(c.greet());
        "#;

        assert_eq!(run(source).lines(), vec!["hello from C", "C>B>A"]);
    }

    #[test]
    fn test_inherited_initializer() {
        let source = r#"
            class Base { init(n: number) { this.n = n; } }
            class Derived : Base {}
            print(Derived(7).n);
        "#;

        assert_eq!(run(source).lines(), vec!["7"]);
    }

    #[test]
    fn test_display_forms() {
        let source = r#"
            fun f() {}
            class K {}
            print(f);
            print(K);
            print(K());
            print(clock);
            print(fun () {});
            print(class {});
            print(nil);
            print(true);
        "#;

        assert_eq!(
            run(source).lines(),
            vec![
                "<fn f>",
                "<class K>",
                "<instance of <class K>>",
                "<native fn clock>",
                "<anonymous fn>",
                "<anonymous class>",
                "nil",
                "true",
            ]
        );
    }

    #[test]
    fn test_equality() {
        let source = r#"
            print(nil == nil);
            print(nil == false);
            print(1 == 1);
            print("a" == "a");
            print(1 == "1");
            print(1 != 2);
            class A {}
            var a = A();
            print(a == a);
            print(A() == A());
        "#;

        assert_eq!(
            run(source).lines(),
            vec!["true", "false", "true", "true", "false", "true", "true", "false"]
        );
    }

    #[test]
    fn test_if_uses_truthiness() {
        let source = r#"
            fun nothing() { return nil; }
            fun zero() { return 0; }
            if (nothing()) print("yes"); else print("no");
            if (zero()) print("truthy");
        "#;

        assert_eq!(run(source).lines(), vec!["no", "truthy"]);
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        let outcome = run("print(false and undefined_fn());\nprint(true or undefined_fn());");
        assert_eq!(outcome.lines(), vec!["false", "true"]);
        assert_eq!(outcome.exit_code, None);
    }

    #[test]
    fn test_logical_operators_check_evaluated_side() {
        let outcome = run("fun one() { return 1; }\nprint(true and one());");

        assert_eq!(
            outcome.stderr,
            "TypeError: Operand for 'and' must be a boolean, but was 1 instead.\n[line 2]\n"
        );
    }

    #[test]
    fn test_ternary() {
        let outcome = run("var n = 5;\nprint(n > 3 ? \"big\" : \"small\");\nprint(n > 9 ? \"big\" : (n > 4 ? \"mid\" : \"small\"));");

        assert_eq!(outcome.lines(), vec!["big", "mid"]);
    }

    #[test]
    fn test_unary_type_errors() {
        let outcome = run("fun one() { return 1; }\nprint(!one());");
        assert_eq!(
            outcome.stderr,
            "TypeError: Operand for '!' must be a boolean, but was 1 instead.\n[line 2]\n"
        );

        let outcome = run("fun s() { return \"s\"; }\nprint(-s());");
        assert_eq!(
            outcome.stderr,
            "TypeError: Operand for '-' must be a number, but was s instead.\n[line 2]\n"
        );
    }

    #[test]
    fn test_runtime_call_checks() {
        let outcome = run("fun get() { return 1; }\nget()();");
        assert_eq!(
            outcome.stderr,
            "TypeError: Can only call functions and classes, but tried to call 1.\n[line 2]\n"
        );

        let outcome = run("fun get() { return fun (a: number) {}; }\nget()(1, 2);");
        assert_eq!(
            outcome.stderr,
            "TypeError: Expected 1 arguments but got 2.\n[line 2]\n"
        );

        let outcome = run("fun get() { return fun (a: number) {}; }\nget()(\"s\");");
        assert_eq!(
            outcome.stderr,
            "TypeError: Expected an argument of type 'number' for parameter 'a', but was given s instead.\n[line 2]\n"
        );
    }

    #[test]
    fn test_runtime_property_and_superclass_checks() {
        let outcome = run("fun one() { return 1; }\nprint(one().x);");
        assert_eq!(
            outcome.stderr,
            "TypeError: Only instances have properties, but tried to read 'x' on 1.\n[line 2]\n"
        );

        let outcome = run("fun one() { return 1; }\none().x = 2;");
        assert_eq!(
            outcome.stderr,
            "TypeError: Only instances have fields, but tried to set 'x' on 1.\n[line 2]\n"
        );

        let outcome = run("fun one() { return 1; }\nvar N = one();\nclass X : N {}");
        assert_eq!(
            outcome.stderr,
            "TypeError: Superclass must be a class, but was 1 instead.\n[line 3]\n"
        );
    }

    #[test]
    fn test_undefined_global_is_def_error() {
        let outcome = run("print(nope);");

        assert_eq!(outcome.stderr, "DefError: Undefined variable 'nope'.\n[line 1]\n");
        assert_eq!(outcome.exit_code, Some(70));
    }

    #[test]
    fn test_runtime_error_aborts_remaining_statements() {
        let outcome = run("print(1);\nprint(1 / 0);\nprint(2);");

        assert_eq!(outcome.lines(), vec!["1"]);
        assert_eq!(outcome.exit_code, Some(70));
    }

    #[test]
    fn test_call_depth_limit_is_fatal() {
        let config = InterpreterConfig { max_call_depth: 16 };
        let outcome = run_with_config(
            "fun down(n: number) -> number { return down(n + 1); }\ndown(0);",
            config,
        );

        assert_eq!(
            outcome.stderr,
            "Stack overflow: maximum call depth exceeded.\n[line 1]\n"
        );
        assert_eq!(outcome.exit_code, Some(70));
    }

    #[test]
    fn test_depth_limit_allows_recursion_within_bound() {
        let config = InterpreterConfig { max_call_depth: 16 };
        let outcome = run_with_config(
            "fun sum(n: number) -> number { if (n == 0) return 0; return n + sum(n - 1); }\nprint(sum(10));",
            config,
        );

        assert_eq!(outcome.lines(), vec!["55"]);
    }

    #[test]
    fn test_clock_returns_seconds() {
        let outcome = run("var t = clock();\nprint(t > 1000000000);");

        assert_eq!(outcome.lines(), vec!["true"]);
    }

    #[test]
    fn test_default_depth_limit_on_default_thread_stack() {
        let outcome = std::thread::spawn(|| {
            run("fun down(n: number) -> number { return down(n + 1); }\ndown(0);")
        })
        .join()
        .expect("interpreter thread completes");

        assert_eq!(
            outcome.stderr,
            "Stack overflow: maximum call depth exceeded.\n[line 1]\n"
        );
        assert_eq!(outcome.exit_code, Some(70));
    }

    #[test]
    fn test_deep_recursion_below_default_limit() {
        let outcome = std::thread::spawn(|| {
            run("fun sum(n: number) -> number { if (n == 0) return 0; return n + sum(n - 1); }\nprint(sum(500));")
        })
        .join()
        .expect("interpreter thread completes");

        assert_eq!(outcome.stderr, "");
        assert_eq!(outcome.lines(), vec!["125250"]);
    }

    #[test]
    fn test_runtime_errors_carry_their_kind() {
        let cases = [
            ("1 / 0;", Some(RuntimeErrorKind::MathError)),
            ("nope;", Some(RuntimeErrorKind::DefError)),
            ("fun one() { return 1; } one()();", Some(RuntimeErrorKind::TypeError)),
            ("fun down(n: number) -> number { return down(n + 1); } down(0);", None),
        ];

        for (source, kind) in cases {
            let (tokens, _) = Scanner::new(source).scan_all();
            let program = Parser::new(&tokens).parse().expect("parses");

            let mut interpreter = Interpreter::with_config(InterpreterConfig { max_call_depth: 16 });
            Resolver::new(&mut interpreter)
                .resolve(&program)
                .expect("resolves");

            let error = interpreter.interpret(&program).expect_err("fails at runtime");
            assert!(error.is_runtime(), "{} should be a runtime error", source);
            assert_eq!(error.runtime_kind(), kind, "wrong kind for {}", source);
        }
    }

    #[test]
    fn test_huge_numbers_print_in_exponent_form() {
        let outcome = run(
            "print(100000000000000000000000);\n\
             print(1000000000000000000000 * 1.5);\n\
             print(-100000000000000000000000);\n\
             print(100000000000000000000);",
        );

        assert_eq!(
            outcome.lines(),
            vec!["1.0E23", "1.5E21", "-1.0E23", "100000000000000000000"]
        );
    }

    #[test]
    fn test_resolution_errors_block_execution() {
        let outcome = run("print(\"side effect\");\nreturn 1;");

        assert_eq!(outcome.stdout, "");
        assert_eq!(
            outcome.stderr,
            "[line 2, column 6] Error at 'return': Cannot return from outside a function or method.\n"
        );
        assert_eq!(outcome.exit_code, Some(65));
    }

    proptest! {
        #[test]
        fn prop_numeric_literals_evaluate_exactly(n in 0.0f64..1.0e15) {
            let source = n.to_string();
            let value = Session::new().evaluate(&source);

            prop_assert_eq!(value, Some(Value::Number(n)));
        }
    }
}
