mod common;

use common::Workspace;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sable_resolver::Element;

#[test]
fn test_sdk_core_resolves_without_diagnostics() {
    let analysis = Workspace::new(&[]).analyze(&[]);
    assert_eq!(analysis.codes("dart:core"), Vec::<&str>::new());
    assert_eq!(analysis.hint_codes("dart:core"), Vec::<&str>::new());
    assert!(analysis.library("dart:core").class("Object").is_some());
}

#[test]
fn test_prefixed_import_resolves_and_unused_import_is_hinted() {
    let workspace = Workspace::new(&[
        (
            "file:///app/main.dart",
            indoc! {"
                import 'util.dart' as u;
                import 'dart:math';
                void main() {
                  int x = u.twice(2);
                  print(x);
                }
            "},
        ),
        ("file:///app/util.dart", "int twice(int value) => value * 2;"),
    ]);
    let analysis = workspace.analyze(&[
        &["dart:math"],
        &["file:///app/util.dart"],
        &["file:///app/main.dart"],
    ]);

    assert_eq!(analysis.codes("file:///app/main.dart"), Vec::<&str>::new());
    assert_eq!(analysis.codes("file:///app/util.dart"), Vec::<&str>::new());
    assert_eq!(analysis.hint_codes("file:///app/main.dart"), vec!["UNUSED_IMPORT"]);

    let main = analysis.library("file:///app/main.dart");
    assert_eq!(main.imports.len(), 3);
    assert!(main.imports[2].synthetic);
    assert_eq!(main.imports[0].prefix.as_deref(), Some("u"));
    assert_eq!(
        main.entry_point.as_ref().map(|entry| entry.name.as_str()),
        Some("main")
    );

    let resolved = analysis.unit("file:///app/main.dart");
    let used: Vec<usize> = resolved.resolution.used_imports().iter().copied().collect();
    assert_eq!(used, vec![0, 2]);
    let twice = resolved
        .resolution
        .elements()
        .any(|(_, element)| matches!(element, Element::Function(f) if f.name == "twice"));
    assert!(twice);
}

#[test]
fn test_undefined_names_are_reported_in_resolution_order() {
    let workspace = Workspace::new(&[(
        "file:///app/main.dart",
        indoc! {"
            class A {
              int value;
              int read() => value;
            }
            void main() {
              A a = new A();
              a.missing();
              a.value;
              undefinedFunction();
              Unknown u;
              print(nothing);
            }
        "},
    )]);
    let analysis = workspace.analyze(&[&["file:///app/main.dart"]]);

    assert_eq!(
        analysis.codes("file:///app/main.dart"),
        vec![
            "UNDEFINED_CLASS",
            "UNDEFINED_METHOD",
            "UNDEFINED_FUNCTION",
            "UNDEFINED_IDENTIFIER"
        ]
    );
    let messages: Vec<&str> = analysis
        .errors_for("file:///app/main.dart")
        .iter()
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(messages[0], "Undefined class 'Unknown'");
    assert_eq!(
        messages[1],
        "The method 'missing' is not defined for the class 'A'"
    );
}

#[test]
fn test_ambiguous_import_names_both_libraries() {
    let workspace = Workspace::new(&[
        ("file:///proj/a.dart", "class Thing {}"),
        ("file:///proj/b.dart", "class Thing {}"),
        (
            "file:///proj/main.dart",
            "import 'a.dart';\nimport 'b.dart';\nThing thing;\n",
        ),
    ]);
    let analysis = workspace.analyze(&[
        &["file:///proj/a.dart"],
        &["file:///proj/b.dart"],
        &["file:///proj/main.dart"],
    ]);

    let errors = analysis.errors_for("file:///proj/main.dart");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code.name(), "AMBIGUOUS_IMPORT");
    assert!(errors[0].message.contains("'a.dart'"));
    assert!(errors[0].message.contains("'b.dart'"));
}

#[test]
fn test_part_declarations_are_visible_to_the_library() {
    let workspace = Workspace::new(&[
        (
            "file:///proj/lib.dart",
            indoc! {"
                library shapes;
                part 'circle.dart';
                Circle unit = new Circle(1);
            "},
        ),
        (
            "file:///proj/circle.dart",
            indoc! {"
                part of shapes;
                class Circle {
                  final num radius;
                  Circle(this.radius);
                  num area() => radius * radius;
                }
            "},
        ),
    ]);
    let analysis = workspace.analyze(&[&["file:///proj/lib.dart"]]);

    assert_eq!(analysis.codes("file:///proj/lib.dart"), Vec::<&str>::new());
    assert_eq!(analysis.codes("file:///proj/circle.dart"), Vec::<&str>::new());
    let library = analysis.library("file:///proj/lib.dart");
    assert_eq!(library.parts.len(), 1);

    let circle = library.class("Circle").expect("class from the part");
    assert_eq!(circle.constructors[0].parameters[0].declared_type.to_string(), "num");
    assert_eq!(
        circle.supertype.as_ref().map(|t| t.name()),
        Some("Object")
    );
}

#[test]
fn test_expression_types() {
    let workspace = Workspace::new(&[(
        "file:///proj/main.dart",
        indoc! {"
            var sum = 1 + 2;
            var ratio = 1 / 2;
            var mixed = 1 + 2.5;
            var joined = 'a' + 'b';
            var compared = 1 < 2;
        "},
    )]);
    let analysis = workspace.analyze(&[&["file:///proj/main.dart"]]);
    let resolved = analysis.unit("file:///proj/main.dart");

    let types: Vec<String> = resolved
        .unit
        .declarations
        .iter()
        .filter_map(|declaration| match declaration {
            sable_parser::ast::Declaration::Variables(variables) => {
                variables.variables.variables[0].initializer.as_ref()
            }
            _ => None,
        })
        .map(|initializer| resolved.resolution.static_type(initializer.id()).to_string())
        .collect();
    assert_eq!(types, vec!["int", "double", "double", "String", "bool"]);
}
