//! Property tests for numeric coercion and null-skip behavior.

use csval_kernel::schema::Schema;
use csval_kernel::validator::row::{compile_checks, Cell};
use csval_kernel::validator::types::TypeCheck;
use csval_kernel::ScalarValue;
use proptest::prelude::*;

fn integer_check(group_char: &str) -> TypeCheck {
    let doc = format!(
        r#"{{"fields": [{{"name": "n", "type": "integer", "groupChar": "{group_char}"}}]}}"#
    );
    let schema = Schema::from_json_str(&doc).expect("schema should normalize");
    TypeCheck::compile(&schema.fields[0]).expect("should compile")
}

/// Render `n` with a separator every three digits, the way grouped CSV
/// exports write numbers.
fn grouped(n: i64, sep: &str) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        let remaining = digits.len() - i;
        if i > 0 && remaining % 3 == 0 {
            out.push_str(sep);
        }
        out.push(ch);
    }
    if n < 0 {
        format!("-{out}")
    } else {
        out
    }
}

proptest! {
    #[test]
    fn grouped_integers_always_coerce(n in -1_000_000_000i64..1_000_000_000) {
        let check = integer_check(",");
        let mut value = Some(ScalarValue::Str(grouped(n, ",")));
        prop_assert!(check.apply(&mut value));
        prop_assert_eq!(value, Some(ScalarValue::Int(n)));
    }

    #[test]
    fn grouped_text_fails_without_group_char(n in 1_000i64..1_000_000_000) {
        // Separators are only stripped when groupChar says so.
        let check = integer_check("");
        let mut value = Some(ScalarValue::Str(grouped(n, ",")));
        prop_assert!(!check.apply(&mut value));
    }

    #[test]
    fn plain_integers_coerce_regardless_of_group_char(n in any::<i32>()) {
        let check = integer_check(",");
        let mut value = Some(ScalarValue::Str(n.to_string()));
        prop_assert!(check.apply(&mut value));
        prop_assert_eq!(value, Some(ScalarValue::Int(i64::from(n))));
    }

    #[test]
    fn bound_checks_never_fire_on_null(min in -100.0f64..0.0, max in 0.0f64..100.0) {
        let doc = format!(
            r#"{{"fields": [{{"name": "n", "type": "number", "minimum": {min}, "maximum": {max}, "multipleOf": 3}}]}}"#
        );
        let schema = Schema::from_json_str(&doc).expect("schema should normalize");
        let checks = compile_checks(&schema.fields[0]).expect("should compile");

        let mut cell = Cell { value: None, row: 1, column: "n" };
        let errors: Vec<_> = checks.iter().filter_map(|c| c.run(&mut cell)).collect();
        prop_assert!(errors.is_empty());
    }
}
