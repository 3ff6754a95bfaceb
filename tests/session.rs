mod common;

#[cfg(test)]
mod session_tests {
    use pretty_assertions::assert_eq;

    use typelox::ast_printer::AstPrinter;
    use typelox::interpreter::InterpreterConfig;
    use typelox::session::{Session, EXIT_DIAGNOSTIC, EXIT_RUNTIME};
    use typelox::value::Value;

    use crate::common::{run, Harness};

    #[test]
    fn test_exit_codes() {
        assert_eq!(run("print(1);").exit_code, None);
        assert_eq!(run("print(1)").exit_code, Some(EXIT_DIAGNOSTIC));
        assert_eq!(run("print(1 / 0);").exit_code, Some(EXIT_RUNTIME));
    }

    #[test]
    fn test_lexical_errors_block_execution() {
        let outcome = run("print(1); $");

        assert_eq!(outcome.stdout, "");
        assert_eq!(
            outcome.stderr,
            "[line 1, column 11] Error : unexpected character '$'.\n"
        );
        assert_eq!(outcome.exit_code, Some(65));
    }

    #[test]
    fn test_every_parse_error_is_reported() {
        let outcome = run("var = 1;\nvar y = ;\nprint(2);");

        assert_eq!(outcome.stdout, "");
        assert_eq!(
            outcome.stderr,
            "[line 1, column 5] Error at '=': Expect variable name.\n\
             [line 2, column 9] Error at ';': Expect expression.\n"
        );
    }

    #[test]
    fn test_runtime_error_sets_only_runtime_flag() {
        let mut harness = Harness::new();
        harness.session.run("print(1 / 0);");

        assert!(harness.session.had_runtime_error());
        assert!(!harness.session.had_error());
    }

    #[test]
    fn test_repl_prints_bare_expressions() {
        let mut harness = Harness::new();
        harness.session.run_repl_line("1 + 2");
        harness.session.run_repl_line("\"a\" + \"b\"");
        harness.session.run_repl_line("print(\"statement\");");

        assert_eq!(harness.stdout_lines(), vec!["3", "ab", "statement"]);
    }

    #[test]
    fn test_repl_keeps_globals_between_lines() {
        let mut harness = Harness::new();
        harness.session.run_repl_line("var x = 10;");
        harness.session.run_repl_line("fun sq(n: number) -> number { return n * n; }");
        harness.session.run_repl_line("x * 2");
        harness.session.run_repl_line("sq(x)");

        assert_eq!(harness.stdout_lines(), vec!["20", "100"]);
        assert_eq!(harness.session.exit_code(), None);
    }

    #[test]
    fn test_repl_runs_blocks_as_statements() {
        let mut harness = Harness::new();
        harness.session.run_repl_line("{ var a = 1; print(a); }");

        assert_eq!(harness.stdout_lines(), vec!["1"]);
    }

    #[test]
    fn test_repl_ignores_empty_lines() {
        let mut harness = Harness::new();
        harness.session.run_repl_line("");
        harness.session.run_repl_line("   // just a comment");

        assert_eq!(harness.stdout.contents(), "");
        assert_eq!(harness.stderr.contents(), "");
    }

    #[test]
    fn test_reset_errors_lets_repl_continue() {
        let mut harness = Harness::new();

        harness.session.run_repl_line("1 +");
        assert!(harness.session.had_error());

        // Still flagged, so nothing runs.
        harness.session.run_repl_line("2");
        assert_eq!(harness.stdout.contents(), "");

        harness.session.reset_errors();
        harness.session.run_repl_line("3");
        assert_eq!(harness.stdout_lines(), vec!["3"]);
    }

    #[test]
    fn test_repl_recovers_from_runtime_errors() {
        let mut harness = Harness::new();
        harness.session.run_repl_line("var k = 4;");
        harness.session.run_repl_line("k / 0");
        harness.session.run_repl_line("k");

        assert_eq!(
            harness.stderr.contents(),
            "MathError: Cannot divide by zero.\n[line 1]\n"
        );
        assert_eq!(harness.stdout_lines(), vec!["4"]);
    }

    #[test]
    fn test_repl_keeps_global_types_between_lines() {
        let mut harness = Harness::new();
        harness.session.run_repl_line("var x = 1;");
        harness.session.run_repl_line("x = \"a\";");

        assert!(harness.session.had_error());
        assert_eq!(
            harness.stderr.contents(),
            "[line 1, column 1] Error at 'x': Variable 'x' has an established type of number but a value of type string was assigned instead.\n"
        );

        harness.session.reset_errors();
        harness.session.run_repl_line("print(x);");
        assert_eq!(harness.stdout_lines(), vec!["1"]);
    }

    #[test]
    fn test_repl_redeclaration_replaces_global_type() {
        let mut harness = Harness::new();
        harness.session.run_repl_line("var x = 1;");
        harness.session.run_repl_line("var x = \"s\";");
        harness.session.run_repl_line("x = \"t\";");
        harness.session.run_repl_line("x");

        assert_eq!(harness.stderr.contents(), "");
        assert_eq!(harness.stdout_lines(), vec!["t"]);
    }

    #[test]
    fn test_repl_keeps_method_signatures_between_lines() {
        let mut harness = Harness::new();
        harness.session.run_repl_line("class P { get() -> number { return 1; } }");
        harness.session.run_repl_line("var p = P();");
        harness.session.run_repl_line("p.get(1)");

        assert!(harness.session.had_error());
        assert!(harness
            .stderr
            .contents()
            .ends_with("Called function expected 0 arguments, but was given 1 instead.\n"));
        assert_eq!(harness.stdout.contents(), "");
    }

    #[test]
    fn test_repl_continues_after_stack_overflow() {
        let mut harness = Harness::with_config(InterpreterConfig { max_call_depth: 16 });
        harness
            .session
            .run_repl_line("fun down(n: number) -> number { return down(n + 1); }");
        harness.session.run_repl_line("down(0)");

        assert_eq!(
            harness.stderr.contents(),
            "Stack overflow: maximum call depth exceeded.\n[line 1]\n"
        );

        harness.session.run_repl_line("var after = 1 + 1;");
        harness.session.run_repl_line("after");
        assert_eq!(harness.stdout_lines(), vec!["2"]);
    }

    #[test]
    fn test_evaluate() {
        let mut session = Session::new();

        assert_eq!(session.evaluate("1 + 2 * 3"), Some(Value::Number(7.0)));
        assert_eq!(
            session.evaluate("\"n=\" + 4"),
            Some(Value::String("n=4".to_string()))
        );
        assert_eq!(session.evaluate("nil == nil"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_evaluate_reports_failures() {
        let mut harness = Harness::new();
        assert_eq!(harness.session.evaluate("1 / 0"), None);
        assert!(harness.session.had_runtime_error());

        let mut harness = Harness::new();
        assert_eq!(harness.session.evaluate("1 +"), None);
        assert!(harness.session.had_error());
        assert_eq!(
            harness.stderr.contents(),
            "[line 1, column 3] Error at end: Expect expression.\n"
        );
    }

    #[test]
    fn test_parse_expression() {
        let mut session = Session::new();

        let expr = session.parse_expression("a + b * c").expect("parses");
        assert_eq!(AstPrinter::print(&expr), "(a + (b * c))");

        let mut harness = Harness::new();
        assert!(harness.session.parse_expression("1 + $").is_none());
        assert!(harness.session.had_error());
    }
}
