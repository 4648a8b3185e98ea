use hinton_core::config::InterpreterConfig;
use hinton_core::parser::{parse_program, HintonError, Interpreter, RuntimeErrorKind, Value};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::rc::Rc;

#[derive(Clone, Default)]
struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn interpreter() -> (Interpreter, Captured) {
    let out = Captured::default();
    let interpreter = Interpreter::with_io(
        InterpreterConfig::default(),
        Box::new(out.clone()),
        Box::new(Cursor::new(Vec::new())),
    );
    (interpreter, out)
}

fn eval(source: &str) -> Value {
    let (mut interpreter, _) = interpreter();
    interpreter
        .execute_source(source)
        .unwrap()
        .expect("trailing expression")
}

const PROGRAM: &str = r#"
// Classic recursive definitions
func fib(n) {
    if (n < 2) return n;
    return fib(n - 1) + fib(n - 2);
}

func fact(n) {
    if (n <= 1) return 1;
    return n * fact(n - 1);
}

let results = [];
for (let f in [fib, fact]) {
    results = results + [f(12)];
}

const GREETING = "hello";
let words = [GREETING, "hola", "ciao"];
print(words[-2][1]);
print(results);
results;
"#;

#[test]
fn test_full_program() {
    let (mut interpreter, out) = interpreter();
    let result = interpreter.execute_source(PROGRAM).unwrap();

    assert_eq!(
        result,
        Some(Value::from(vec![Value::Int(144), Value::Int(479001600)]))
    );
    assert_eq!(out.text(), "o\n[144, 479001600]\n");
}

#[test]
fn test_parsing_is_idempotent() {
    let first = parse_program(PROGRAM).unwrap();
    let second = parse_program(PROGRAM).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_syntax_errors_accumulate_and_block_execution() {
    let (mut interpreter, out) = interpreter();
    let source = "print(\"never\");\nlet = 1;\nlet b = ;\nconst C;\nprint(\"still never\");";

    let err = interpreter.execute_source(source).unwrap_err();
    let errors = err.syntax_errors();
    assert_eq!(errors.len(), 3);
    assert_eq!(
        errors.iter().map(|e| e.span.line).collect::<Vec<_>>(),
        vec![2, 3, 4]
    );
    assert_eq!(out.text(), "");
}

#[test]
fn test_invalid_assignment_target_is_a_syntax_error() {
    let err = parse_program("1 + 2 = 3;").unwrap_err();
    assert_eq!(err[0].message, "Invalid assignment target.");
}

#[test]
fn test_runtime_error_carries_location() {
    let (mut interpreter, _) = interpreter();
    let err = interpreter
        .execute_source("let a = [1, 2, 3];\n\na[3];")
        .unwrap_err();

    let runtime = err.runtime_error().unwrap();
    assert_eq!(runtime.kind, RuntimeErrorKind::IndexOutOfRange);
    assert_eq!(runtime.message, "Index 3 out of range for length 3.");
    assert_eq!(runtime.span.line, 3);
}

#[test]
fn test_interpreter_state_persists_between_runs() {
    let (mut interpreter, _) = interpreter();
    interpreter.execute_source("let total = 0;").unwrap();
    interpreter.execute_source("total += 5;").unwrap();
    let result = interpreter.execute_source("total;").unwrap();
    assert_eq!(result, Some(Value::Int(5)));
}

#[test]
fn test_run_source_wraps_pipeline_errors() {
    let (mut interpreter, _) = interpreter();
    let err = interpreter.run_source("undefined_thing;").unwrap_err();
    let pipeline = err.downcast_ref::<HintonError>().unwrap();
    assert_eq!(
        pipeline.runtime_error().map(|e| e.kind),
        Some(RuntimeErrorKind::UndefinedVariable)
    );
}

#[test]
fn test_run_file_reports_missing_file() {
    let (mut interpreter, _) = interpreter();
    let err = interpreter
        .run_file("/definitely/not/here.hn")
        .unwrap_err();
    assert!(err.to_string().starts_with("Failed to read"));
}

#[test]
fn test_closure_scenario() {
    let source = r#"
        func outer() {
            let x = 1;
            func middle() {
                func inner() { x = 3; }
                inner();
                return x;
            }
            let from_middle = middle();
            return [from_middle, x];
        }
        outer();
    "#;
    assert_eq!(eval(source), Value::from(vec![Value::Int(3), Value::Int(3)]));
}

#[test]
fn test_every_runtime_error_kind_is_reachable() {
    let cases = [
        ("\"a\" * 2;", RuntimeErrorKind::TypeMismatch),
        ("nope;", RuntimeErrorKind::UndefinedVariable),
        ("const K = 1; K = 2;", RuntimeErrorKind::ConstantReassignment),
        ("\"text\"();", RuntimeErrorKind::NotCallable),
        ("func f(a) {} f();", RuntimeErrorKind::ArityMismatch),
        ("[][0];", RuntimeErrorKind::IndexOutOfRange),
        ("[1][\"0\"];", RuntimeErrorKind::NonIntegerIndex),
        ("null[0];", RuntimeErrorKind::UnsupportedIndexTarget),
        ("({a: 1})[\"b\"];", RuntimeErrorKind::KeyNotFound),
        ("5 / 0;", RuntimeErrorKind::DivisionByZero),
        ("2 ** 64;", RuntimeErrorKind::IntegerOverflow),
        ("continue;", RuntimeErrorKind::MisplacedControlFlow),
        ("func r() { return r(); } r();", RuntimeErrorKind::StackOverflow),
        ("next(iter(\"\"));", RuntimeErrorKind::IteratorExhausted),
        ("assert(false);", RuntimeErrorKind::AssertionFailed),
    ];

    for (source, kind) in cases {
        let (mut interpreter, _) = interpreter();
        let err = interpreter.execute_source(source).unwrap_err();
        assert_eq!(
            err.runtime_error().map(|e| e.kind),
            Some(kind),
            "source: {}",
            source
        );
    }
}

#[test]
fn test_native_failure_from_host_function() {
    let (mut interpreter, _) = interpreter();
    interpreter.register_native("fail", 0, 0, |_, _| {
        Err(io::Error::new(io::ErrorKind::Other, "disk on fire").into())
    });
    let err = interpreter.execute_source("fail();").unwrap_err();
    let runtime = err.runtime_error().unwrap();
    assert_eq!(runtime.kind, RuntimeErrorKind::NativeFailure);
    assert!(runtime.message.contains("disk on fire"));
}

#[test]
fn test_convenience_run() {
    assert_eq!(
        hinton_core::run("let s = 0; for (let i in 1..4) s += i; s;").unwrap(),
        Some(Value::Int(6))
    );
}
