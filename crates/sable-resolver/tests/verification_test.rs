mod common;

use common::Workspace;
use indoc::indoc;
use pretty_assertions::assert_eq;

const MAIN: &str = "file:///proj/main.dart";

fn analyze(text: &str) -> common::Analysis {
    Workspace::new(&[(MAIN, text)]).analyze(&[&["dart:math"], &[MAIN]])
}

fn messages(analysis: &common::Analysis) -> Vec<String> {
    analysis
        .errors_for(MAIN)
        .iter()
        .map(|e| e.message.clone())
        .collect()
}

#[test]
fn test_inheritance_checks() {
    let analysis = analyze(indoc! {"
        abstract class Shape {
          num area();
          String describe(String prefix) => prefix;
        }
        class Square extends Shape {
          String describe(String prefix, String suffix) => prefix;
        }
        class Circle extends Shape {
          num area() => 3;
          int describe(String prefix) => 1;
        }
        class Broken {
          void run();
        }
    "});
    assert_eq!(
        analysis.codes(MAIN),
        vec![
            "NON_ABSTRACT_CLASS_INHERITS_ABSTRACT_MEMBER",
            "INVALID_METHOD_OVERRIDE_REQUIRED",
            "INVALID_METHOD_OVERRIDE_RETURN_TYPE",
            "CONCRETE_CLASS_WITH_ABSTRACT_MEMBER",
        ]
    );
    assert_eq!(
        messages(&analysis),
        vec![
            "Missing concrete implementation of 'area'",
            "Must have 1 required parameters or less to match the overridden method from 'Shape'",
            "The return type 'int' is not assignable to 'String' as required by the method it is \
             overriding from 'Shape'",
            "'run' must have a method body because 'Broken' is not abstract",
        ]
    );
}

#[test]
fn test_recursive_inheritance_reports_each_class_in_the_cycle() {
    let analysis = analyze(indoc! {"
        class A extends B {}
        class B extends A {}
        class C extends A {}
    "});
    assert_eq!(
        messages(&analysis),
        vec![
            "'A' cannot be a superinterface of itself: A, B, A",
            "'B' cannot be a superinterface of itself: B, A, B",
        ]
    );
}

#[test]
fn test_type_checks() {
    let analysis = analyze(indoc! {r#"
        int count() {
          return "many";
        }
        void log() {
          return 1;
        }
        void main() {
          final int limit = 3;
          String name = 42;
          limit = 4;
          if (limit) {}
          while (name) {}
          count(1);
          print();
        }
    "#});
    assert_eq!(
        analysis.codes(MAIN),
        vec![
            "RETURN_OF_INVALID_TYPE",
            "RETURN_OF_INVALID_TYPE",
            "INVALID_ASSIGNMENT",
            "ASSIGNMENT_TO_FINAL",
            "NON_BOOL_CONDITION",
            "NON_BOOL_CONDITION",
            "EXTRA_POSITIONAL_ARGUMENTS",
            "NOT_ENOUGH_REQUIRED_ARGUMENTS",
        ]
    );
    let messages = messages(&analysis);
    assert_eq!(
        messages[0],
        "The return type 'String' is not a 'int', as defined by the method 'count'"
    );
    assert_eq!(
        messages[2],
        "A value of type 'int' cannot be assigned to a variable of type 'String'"
    );
    assert_eq!(messages[7], "1 required argument(s) expected, but 0 found");
}

#[test]
fn test_instantiating_an_abstract_class() {
    let analysis = analyze(indoc! {"
        abstract class Base {}
        var base = new Base();
    "});
    assert_eq!(analysis.codes(MAIN), vec!["INSTANTIATE_ABSTRACT_CLASS"]);
}

#[test]
fn test_constant_evaluation_errors() {
    let analysis = analyze(indoc! {r#"
        const a = b;
        const b = a;
        const zero = 0;
        const ratio = 1 ~/ zero;
        const text = "x" - 1;
        int counter = 0;
        const copy = counter;
        const ok = 2 + 3 * 4;
    "#});
    assert_eq!(
        analysis.codes(MAIN),
        vec![
            "RECURSIVE_COMPILE_TIME_CONSTANT",
            "RECURSIVE_COMPILE_TIME_CONSTANT",
            "CONST_EVAL_THROWS_EXCEPTION",
            "CONST_EVAL_TYPE_NUM",
            "CONST_INITIALIZED_WITH_NON_CONSTANT_VALUE",
        ]
    );
}

#[test]
fn test_duplicate_definitions() {
    let analysis = analyze(indoc! {"
        class A {
          int x;
          void x() {}
        }
        int value = 1;
        void value() {}
        void f(int p, int p) {
          var local = 1;
          var local = 2;
        }
    "});
    assert_eq!(
        messages(&analysis),
        vec![
            "The name 'value' is already defined",
            "The name 'x' is already defined",
            "The name 'p' is already defined",
            "The name 'local' is already defined",
        ]
    );
}

#[test]
fn test_hints_for_dead_code_and_unused_locals() {
    let analysis = analyze(indoc! {"
        import 'dart:math';
        int compute() {
          int unused = 1;
          return 2;
          print(3);
        }
        void main() {
          if (false) {
            print(1);
          }
          bool flag = true || compute() > 0;
          print(flag);
        }
    "});
    assert_eq!(analysis.codes(MAIN), Vec::<&str>::new());
    assert_eq!(
        analysis.hint_codes(MAIN),
        vec![
            "UNUSED_IMPORT",
            "DEAD_CODE",
            "DEAD_CODE",
            "DEAD_CODE",
            "UNUSED_LOCAL_VARIABLE",
        ]
    );
}

#[test]
fn test_duplicate_import_hint() {
    let analysis = analyze(indoc! {"
        import 'dart:math';
        import 'dart:math';
        num biggest = max(1, 2);
    "});
    assert_eq!(analysis.codes(MAIN), Vec::<&str>::new());
    assert_eq!(analysis.hint_codes(MAIN), vec!["DUPLICATE_IMPORT"]);
}
