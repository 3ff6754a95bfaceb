#[cfg(test)]
mod parser_tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use typelox::ast::{Expr, LiteralValue, Stmt};
    use typelox::ast_printer::AstPrinter;
    use typelox::error::LoxError;
    use typelox::parser::Parser;
    use typelox::scanner::Scanner;
    use typelox::session::Session;
    use typelox::types::{ClassType, FunctionType, LoxType};

    fn parse_expr(source: &str) -> Result<Expr, Vec<LoxError>> {
        let (tokens, errors) = Scanner::new(source).scan_all();
        assert!(errors.is_empty(), "unexpected lexical errors: {:?}", errors);
        Parser::new(&tokens).parse_expression()
    }

    fn parse_program(source: &str) -> Result<Vec<Stmt>, Vec<LoxError>> {
        let (tokens, errors) = Scanner::new(source).scan_all();
        assert!(errors.is_empty(), "unexpected lexical errors: {:?}", errors);
        Parser::new(&tokens).parse()
    }

    fn printed(source: &str) -> String {
        match parse_expr(source) {
            Ok(expr) => AstPrinter::print(&expr),
            Err(errors) => panic!("parse failed: {:?}", errors),
        }
    }

    fn error_messages(errors: &[LoxError]) -> Vec<String> {
        errors.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(printed("1 + 2 * 3 - 4 / 2"), "((1 + (2 * 3)) - (4 / 2))");
    }

    #[test]
    fn test_unary_and_grouping() {
        assert_eq!(printed("-(1 + 2) == !true"), "((-((1 + 2))) == (!true))");
    }

    #[test]
    fn test_logical_precedence() {
        assert_eq!(printed("a or b and c"), "(a or (b and c))");
    }

    #[test]
    fn test_ternary_branches_parse_at_or_level() {
        assert_eq!(
            printed("x > 1 ? \"big\" : \"small\""),
            "((x > 1) ? \"big\" : \"small\")"
        );
        assert_eq!(
            printed("a or b ? c and d : e"),
            "((a or b) ? (c and d) : e)"
        );
    }

    #[test]
    fn test_call_and_property_chain() {
        assert_eq!(printed("a.b(1, 2).c"), "a.b(1, 2).c");
        assert_eq!(printed("f()()"), "f()()");
    }

    #[test]
    fn test_assignment_targets() {
        assert_eq!(printed("a = b = 3"), "(a = (b = 3))");
        assert_eq!(printed("obj.field = 1"), "(obj.field = 1)");

        let errors = parse_expr("1 = 2").unwrap_err();
        assert_eq!(
            error_messages(&errors),
            vec!["[line 1, column 3] Error at '=': Invalid assignment target."]
        );
    }

    #[test]
    fn test_leading_binary_operator_rejected() {
        let errors = parse_expr("* 3").unwrap_err();
        assert_eq!(
            error_messages(&errors),
            vec!["[line 1, column 1] Error at '*': Operator '*' must have a left-hand operand."]
        );
    }

    #[test]
    fn test_trailing_tokens_after_expression() {
        let errors = parse_expr("1 2").unwrap_err();
        assert_eq!(
            error_messages(&errors),
            vec!["[line 1, column 3] Error at '2': Expect end of expression."]
        );
    }

    #[test]
    fn test_error_at_end() {
        let errors = parse_expr("(1 + 2").unwrap_err();
        assert_eq!(
            error_messages(&errors),
            vec!["[line 1, column 6] Error at end: Expect ')' after expression."]
        );
    }

    #[test]
    fn test_for_loop_desugars_to_while() {
        let program = parse_program("for (var i = 0; i < 3; i = i + 1) print(i);").unwrap();
        assert_eq!(program.len(), 1);

        let Stmt::Block(outer) = &program[0] else {
            panic!("expected a block, got {:?}", program[0]);
        };
        assert_eq!(outer.len(), 2);
        assert!(matches!(&outer[0], Stmt::Var { name, .. } if name.lexeme == "i"));

        let Stmt::While { condition, body, .. } = &outer[1] else {
            panic!("expected a while loop, got {:?}", outer[1]);
        };
        assert_eq!(AstPrinter::print(condition), "(i < 3)");

        let Stmt::Block(inner) = body.as_ref() else {
            panic!("expected the body block, got {:?}", body);
        };
        assert_eq!(inner.len(), 2);
        assert!(matches!(&inner[1], Stmt::Expression(Expr::Assign { .. })));
    }

    #[test]
    fn test_for_loop_without_clauses() {
        let program = parse_program("for (;;) break;").unwrap();

        let Stmt::While { condition, body, .. } = &program[0] else {
            panic!("expected a bare while loop, got {:?}", program[0]);
        };
        assert_eq!(condition, &Expr::Literal(LiteralValue::Bool(true)));
        assert!(matches!(body.as_ref(), Stmt::Break { .. }));
    }

    #[test]
    fn test_recovery_reports_every_error() {
        let errors = parse_program("var = 1;\nvar y = ;\nprint(2);").unwrap_err();

        assert_eq!(
            error_messages(&errors),
            vec![
                "[line 1, column 5] Error at '=': Expect variable name.",
                "[line 2, column 9] Error at ';': Expect expression.",
            ]
        );
    }

    #[test]
    fn test_named_declarations_versus_anonymous_expressions() {
        let program = parse_program("fun named() {}\nfun () {};\nclass A {}\nclass {};").unwrap();
        assert_eq!(program.len(), 4);

        assert!(matches!(&program[0], Stmt::Function(decl) if decl.name.is_some()));
        assert!(matches!(&program[1], Stmt::Expression(Expr::Function(decl)) if decl.name.is_none()));
        assert!(matches!(&program[2], Stmt::Class(decl) if decl.name.is_some()));
        assert!(matches!(&program[3], Stmt::Expression(Expr::Class(decl)) if decl.name.is_none()));
    }

    #[test]
    fn test_function_signature_types() {
        let program = parse_program(
            "fun f(a: number, g: (number, string) -> boolean, p: Point, h: ()) -> string { return \"\"; }\n\
             fun untyped(x: any_class) {}",
        )
        .unwrap();

        let Stmt::Function(decl) = &program[0] else {
            panic!("expected a function, got {:?}", program[0]);
        };

        assert_eq!(
            decl.param_types(),
            vec![
                LoxType::Number,
                LoxType::Function(FunctionType::new(
                    vec![LoxType::Number, LoxType::String],
                    LoxType::Boolean
                )),
                ClassType::named("Point").instance(),
                LoxType::Function(FunctionType::new(Vec::new(), LoxType::None)),
            ]
        );
        assert_eq!(decl.return_type, LoxType::String);

        let Stmt::Function(untyped) = &program[1] else {
            panic!("expected a function, got {:?}", program[1]);
        };
        assert_eq!(untyped.return_type, LoxType::Unknown);
    }

    #[test]
    fn test_parameter_requires_type() {
        let errors = parse_program("fun f(a) {}").unwrap_err();
        assert_eq!(
            error_messages(&errors),
            vec!["[line 1, column 8] Error at ')': Type must be separated from parameter name by colon."]
        );
    }

    #[test]
    fn test_class_with_superclass_and_methods() {
        let program = parse_program(
            "class B : A {\n  init(x: number) { this.x = x; }\n  get() -> number { return this.x; }\n}",
        )
        .unwrap();

        let Stmt::Class(decl) = &program[0] else {
            panic!("expected a class, got {:?}", program[0]);
        };

        assert!(matches!(&decl.superclass, Some(Expr::Variable { name, .. }) if name.lexeme == "A"));

        let names: Vec<&str> = decl.methods.iter().map(|m| m.blame().lexeme.as_str()).collect();
        assert_eq!(names, vec!["init", "get"]);
    }

    #[test]
    fn test_argument_limit() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        let errors = parse_program(&source).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .to_string()
            .ends_with("Cannot have more than 255 arguments."));
    }

    #[test]
    fn test_super_requires_method_name() {
        let errors = parse_program("super;").unwrap_err();
        assert!(errors[0].to_string().ends_with("Expect '.' after 'super'."));
    }

    // ── round trip through the printer ───────────────────────────────────

    fn evaluate(source: &str) -> Option<String> {
        Session::new().evaluate(source).map(|v| v.to_string())
    }

    #[test]
    fn test_printed_form_evaluates_to_same_value() {
        for source in [
            "1 + 2 * 3",
            "\"a\" + 1 + 2",
            "-(4 - 6) * 2.5",
            "1 < 2 and !(3 >= 4)",
            "nil == nil ? \"same\" : \"different\"",
            "(1 + 2) / 4",
        ] {
            let once = printed(source);
            let twice = printed(&once);

            assert_eq!(once, twice, "printing is not stable for {}", source);
            assert_eq!(evaluate(source), evaluate(&once), "value changed for {}", source);
        }
    }

    fn arithmetic() -> impl Strategy<Value = String> {
        let leaf = (0u32..100).prop_map(|n| n.to_string());

        leaf.prop_recursive(4, 32, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{} + {}", a, b)),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{} * ({})", a, b)),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({}) - {}", a, b)),
                inner.prop_map(|a| format!("-({})", a)),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_round_trip_preserves_value(source in arithmetic()) {
            let reprinted = printed(&source);
            prop_assert_eq!(evaluate(&source), evaluate(&reprinted));
        }
    }
}
