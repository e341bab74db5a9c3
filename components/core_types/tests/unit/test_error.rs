//! Unit tests for JsError and ErrorKind

use core_types::{ErrorKind, JsError, StackFrame};

#[cfg(test)]
mod error_kind_tests {
    use super::*;

    #[test]
    fn test_error_kind_names_match_constructors() {
        let kinds = [
            (ErrorKind::Error, "Error"),
            (ErrorKind::SyntaxError, "SyntaxError"),
            (ErrorKind::TypeError, "TypeError"),
            (ErrorKind::ReferenceError, "ReferenceError"),
            (ErrorKind::RangeError, "RangeError"),
            (ErrorKind::EvalError, "EvalError"),
            (ErrorKind::URIError, "URIError"),
            (ErrorKind::InternalError, "InternalError"),
        ];
        for (kind, name) in kinds {
            assert_eq!(kind.name(), name);
        }
    }

    #[test]
    fn test_error_kind_deserializes_by_name() {
        let kinds: Vec<ErrorKind> = serde_json::from_str(r#"["TypeError", "RangeError"]"#).unwrap();
        assert_eq!(kinds, vec![ErrorKind::TypeError, ErrorKind::RangeError]);
    }

    #[test]
    fn test_error_kind_serializes_by_name() {
        let json = serde_json::to_string(&ErrorKind::ReferenceError).unwrap();
        assert_eq!(json, r#""ReferenceError""#);
    }

    #[test]
    fn test_unknown_error_kind_is_rejected() {
        let parsed: Result<ErrorKind, _> = serde_json::from_str(r#""NotAnError""#);
        assert!(parsed.is_err());
    }
}

#[cfg(test)]
mod js_error_tests {
    use super::*;

    #[test]
    fn test_constructors_set_kind() {
        assert_eq!(JsError::error("x").kind, ErrorKind::Error);
        assert_eq!(JsError::type_error("x").kind, ErrorKind::TypeError);
        assert_eq!(JsError::range_error("x").kind, ErrorKind::RangeError);
        assert_eq!(JsError::reference_error("x").kind, ErrorKind::ReferenceError);
    }

    #[test]
    fn test_display_is_name_and_message() {
        let error = JsError::reference_error("foo is not defined");
        assert_eq!(error.to_string(), "ReferenceError: foo is not defined");
    }

    #[test]
    fn test_format_stack_lists_frames() {
        let error = JsError::error("x").with_stack(vec![
            StackFrame {
                function_name: Some("inner".to_string()),
                source_url: Some("a.js".to_string()),
                line: 2,
                column: 4,
            },
            StackFrame {
                function_name: None,
                source_url: Some("a.js".to_string()),
                line: 9,
                column: 1,
            },
        ]);

        let lines: Vec<_> = error.format_stack().lines().map(str::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "Error: x".to_string(),
                "    at inner (a.js:2:4)".to_string(),
                "    at a.js:9:1".to_string(),
            ]
        );
    }

    #[test]
    fn test_js_error_is_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&JsError::type_error("x"));
    }

    #[test]
    fn test_js_error_clone_is_equal() {
        let error = JsError::type_error("x");
        assert_eq!(error.clone(), error);
    }
}
