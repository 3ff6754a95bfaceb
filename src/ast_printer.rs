use crate::ast::{Expr, LiteralValue};

/// Renders an expression back to source that the parser accepts again.
/// Every operator application is parenthesised, so precedence never has to
/// be reconstructed.  Function and class expressions print as `<fn>` /
/// `<class>` placeholders and do not round‑trip.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal(lit) => match lit {
                LiteralValue::Bool(b) => b.to_string(),

                LiteralValue::Nil => "nil".into(),

                LiteralValue::Str(s) => format!("\"{}\"", s),

                // 3.0 → 3, 0.25 → 0.25; never exponent notation.
                LiteralValue::Number(n) => n.to_string(),
            },

            // ── grouping ────────────────────────────────────────────────
            Expr::Grouping(inner) => format!("({})", Self::print(inner)),

            // ── operators ───────────────────────────────────────────────
            Expr::Unary { operator, right } => {
                format!("({}{})", operator.lexeme, Self::print(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                Self::print(left),
                operator.lexeme,
                Self::print(right)
            ),

            Expr::Ternary {
                condition,
                positive,
                negative,
                ..
            } => format!(
                "({} ? {} : {})",
                Self::print(condition),
                Self::print(positive),
                Self::print(negative)
            ),

            // ── names ───────────────────────────────────────────────────
            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::This { .. } => "this".into(),

            Expr::Super { method, .. } => format!("super.{}", method.lexeme),

            Expr::Assign { name, value, .. } => {
                format!("({} = {})", name.lexeme, Self::print(value))
            }

            // ── calls and properties ────────────────────────────────────
            Expr::Call {
                callee, arguments, ..
            } => {
                let args: Vec<String> = arguments.iter().map(Self::print).collect();
                format!("{}({})", Self::print(callee), args.join(", "))
            }

            Expr::Get { object, name } => format!("{}.{}", Self::print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "({}.{} = {})",
                Self::print(object),
                name.lexeme,
                Self::print(value)
            ),

            // ── inline declarations ─────────────────────────────────────
            Expr::Function(decl) => match &decl.name {
                Some(name) => format!("<fn {}>", name.lexeme),
                None => "<fn>".into(),
            },

            Expr::Class(decl) => match &decl.name {
                Some(name) => format!("<class {}>", name.lexeme),
                None => "<class>".into(),
            },
        }
    }
}
