// End-to-end execution tests: run Link source against a runtime whose console
// writes into an in-memory buffer, then compare what the script printed.

use linklang::{Console, ErrorKind, Runtime, Value};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::rc::Rc;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn runtime_with_input(input: &str) -> (Runtime, SharedBuffer) {
    let output = SharedBuffer::default();
    let console = Console::new(output.clone(), Cursor::new(input.as_bytes().to_vec()));
    (Runtime::with_console(console), output)
}

fn run(source: &str) -> String {
    let (mut runtime, output) = runtime_with_input("");
    if let Err(error) = runtime.run_source(source) {
        panic!("program failed: {}\noutput so far:\n{}", error, output.contents());
    }
    output.contents()
}

// ============================================================================
// Expressions and values
// ============================================================================

#[test]
fn arithmetic_follows_precedence() {
    assert_eq!(run("print(2 + 3 * 4)\nprint((2 + 3) * 4)\nprint(10 - 4 - 3)"), "14\n20\n3\n");
}

#[test]
fn set_statement_stores_the_evaluated_expression() {
    assert_eq!(run("set x = 2 + 3 * 4\nprint(x)"), "14\n");
}

#[test]
fn division_truncates_and_never_fails() {
    assert_eq!(
        run("print(7 / 2)\nprint(1 / 0)\nprint(1.0 / 0)\nprint(7 / 2.0)"),
        "3\n0\n0.0\n3.5\n"
    );
}

#[test]
fn integer_arithmetic_wraps() {
    assert_eq!(
        run("big = 9223372036854775807\nprint(big + 1)"),
        "-9223372036854775808\n"
    );
}

#[test]
fn floats_always_show_a_decimal_place() {
    assert_eq!(
        run("print(5.0)\nprint(2 * 2.5)\nprint(math.sqrt(16))\nprint(math.pow(2, 10))"),
        "5.0\n5.0\n4.0\n1024.0\n"
    );
}

#[test]
fn string_concatenation_accepts_printable_operands() {
    let source = r#"
print("n=" + 5)
print("f=" + 2.5)
print("c=" + 'x')
print("b=" + true)
"#;
    assert_eq!(run(source), "n=5\nf=2.5\nc=x\nb=\n");
}

#[test]
fn truthiness_rules() {
    let source = r#"
if "text" { print("string") } else { print("no string") }
if [0] { print("list") }
if 0.0 { print("zero") } elif 2 { print("two") }
"#;
    assert_eq!(run(source), "no string\nlist\ntwo\n");
}

#[test]
fn printing_a_list_that_contains_itself_elides_the_cycle() {
    let source = "a = [1]\nlist.add(a, a)\nprint(len(a))\nprint(a)\nd = {\"k\": a}\nprint(d)\n";
    assert_eq!(run(source), "2\n[1, [...]]\n{\"k\": [1, [...]]}\n");
}

#[test]
fn lists_are_shared_between_names() {
    let source = "a = [1, 2]\nb = a\nlist.add(b, 3)\nprint(a)\nprint(len(a))\n";
    assert_eq!(run(source), "[1, 2, 3]\n3\n");
}

#[test]
fn dicts_display_sorted_and_index_by_key() {
    let source = r#"
d = {"b": 2, "a": 1}
print(d)
print(d["a"])
print(d["zzz"])
"#;
    assert_eq!(run(source), "{\"a\": 1, \"b\": 2}\n1\nnil\n");
}

#[test]
fn list_indexing_counts_from_the_end_and_reports_out_of_range() {
    let source = "xs = [1, 2, 3]\nprint(xs[-1])\nprint(xs[5])\nprint(\"still\")\n";
    assert_eq!(
        run(source),
        "3\nRuntime Error: Index 5 out of bounds (length 3)\nnil\nstill\n"
    );
}

// ============================================================================
// Blocks, control flow and functions
// ============================================================================

#[test]
fn brace_and_indentation_blocks_are_equivalent() {
    let indented = r#"
func greet(name)
    if name == "Ada"
        print("hi " + name)
    else
        print("who?")
greet("Ada")
greet("Bob")
"#;
    let braced = r#"
func greet(name) {
  if name == "Ada" {
    print("hi " + name)
  } else {
    print("who?")
  }
}
greet("Ada")
greet("Bob")
"#;
    assert_eq!(run(indented), "hi Ada\nwho?\n");
    assert_eq!(run(indented), run(braced));
}

#[test]
fn range_drives_for_loops() {
    let source = r#"
count = 0
for i in range(5)
    count++
print(count)
for i in range(0)
    count++
for i in range(-3)
    count++
print(count)
"#;
    assert_eq!(run(source), "5\n5\n");
}

#[test]
fn for_binds_range_values_in_order_and_skips_non_lists() {
    let source = "for x in range(3) { print(x) }\nfor x in 5 { print(x) }\nprint(\"after\")\n";
    assert_eq!(
        run(source),
        "0\n1\n2\nRuntime Error: 'for' loop expects a list, got int\nafter\n"
    );
}

#[test]
fn for_iterates_a_snapshot_of_the_list() {
    let source = "xs = [1, 2]\nfor x in xs\n    list.add(xs, x)\nprint(xs)\n";
    assert_eq!(run(source), "[1, 2, 1, 2]\n");
}

#[test]
fn return_unwinds_out_of_nested_loops() {
    let source = r#"
func first_over(limit)
    i = 0
    while true
        i++
        if i > limit
            return i
    return -1
print(first_over(3))
"#;
    assert_eq!(run(source), "4\n");
}

#[test]
fn recursion() {
    let source = r#"
func fib(n)
    if n < 2
        return n
    return fib(n - 1) + fib(n - 2)
print(fib(10))
"#;
    assert_eq!(run(source), "55\n");
}

#[test]
fn unbounded_recursion_stops_at_the_call_depth_limit() {
    let (mut runtime, _output) = runtime_with_input("");
    let error = runtime
        .run_source("func f(n)\n    return f(n + 1)\nf(0)\n")
        .unwrap_err();

    assert_eq!(error.kind, ErrorKind::RuntimeError);
    assert!(error.message.contains("Maximum call depth exceeded in 'f'"));

    // The runtime stays usable afterwards.
    runtime.run_source("print(\"recovered\")").unwrap();
}

#[test]
fn top_level_return_stops_quietly() {
    assert_eq!(run("print(1)\nreturn\nprint(2)"), "1\n");
}

#[test]
fn arity_mismatch_is_reported_and_yields_nil() {
    let source = "func add(a, b)\n    return a + b\nprint(add(1))\nprint(\"done\")\n";
    assert_eq!(
        run(source),
        "Runtime Error: Function add expects 2 argument(s), got 1\nnil\ndone\n"
    );
}

#[test]
fn unknown_function_is_reported_and_execution_continues() {
    assert_eq!(
        run("missing(1)\nprint(\"ok\")"),
        "Runtime Error: Undefined function 'missing'\nok\n"
    );
}

#[test]
fn functions_cannot_see_caller_locals() {
    let source = r#"
func show() {
  print(secret)
}
func outer() {
  set secret = 42
  show()
}
try {
  outer()
} catch (e) {
  print("caught")
}
"#;
    let (mut runtime, output) = runtime_with_input("");
    let error = runtime.run_source(source).unwrap_err();

    assert_eq!(error.kind, ErrorKind::RuntimeError);
    assert!(error.message.contains("Undefined variable 'secret'"));
    assert_eq!(output.contents(), "");
}

// ============================================================================
// Classes
// ============================================================================

#[test]
fn class_with_init_and_method() {
    let source = r#"
class Box {
  func init(v) { set this.v = v }
  func get() { return this.v }
}
b = new Box(5)
print(b.get())
"#;
    assert_eq!(run(source), "5\n");
}

#[test]
fn class_declared_on_one_line() {
    let source = "class Box { func init(v) { set this.v = v } func get() { return this.v } }\n\
                  set b = new Box(5)\n\
                  print(b.get())\n";
    assert_eq!(run(source), "5\n");
}

#[test]
fn instance_fields_and_display() {
    let source = r#"
class Point
    func init(x)
        set this.x = x
p = new Point(3)
print(p)
print(p.x)
print(p.missing)
p.y = 4
print(p.y)
n = 5
print(n.x)
"#;
    assert_eq!(
        run(source),
        "<Point instance>\n3\nnil\n4\nRuntime Error: Only instances have fields (tried 'x' on int)\nnil\n"
    );
}

#[test]
fn missing_method_is_reported() {
    let source = "class A\n    func f()\n        return 1\na = new A\nprint(a.g())\n";
    assert_eq!(run(source), "Runtime Error: Method 'g' not found on A\nnil\n");
}

#[test]
fn new_on_a_non_class_is_reported_and_yields_nil() {
    assert_eq!(
        run("print(new Nope())"),
        "Runtime Error: 'Nope' is not a class\nnil\n"
    );
}

// ============================================================================
// Exceptions, files and imports
// ============================================================================

#[test]
fn reading_a_missing_file_can_be_caught() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.txt");
    let source = format!(
        r#"
try {{
  data = io.read("{}")
  print("unreachable")
}} catch (e) {{
  print(e)
}}
print("after")
"#,
        missing.display()
    );

    assert_eq!(
        run(&source),
        format!("File not found: {}\nafter\n", missing.display())
    );
}

#[test]
fn file_builtins_round_trip_through_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    let source = format!(
        r#"
path = "{}"
io.write(path, "one")
io.append(path, "two")
print(io.read(path))
print(io.exists(path))
io.remove(path)
print(io.exists(path))
"#,
        path.display()
    );

    assert_eq!(run(&source), "onetwo\ntrue\nfalse\n");
}

#[test]
fn import_runs_the_file_in_the_global_scope() {
    let dir = TempDir::new().unwrap();
    let lib = dir.path().join("lib.link");
    std::fs::write(&lib, "func double(n)\n    return n * 2\nshared = 10\n").unwrap();

    let (mut runtime, output) = runtime_with_input("");
    let source = format!(
        "import \"{}\"\nprint(double(21))\nprint(shared)\n",
        lib.display()
    );
    runtime.run_source(&source).unwrap();

    assert_eq!(output.contents(), "42\n10\n");
    assert_eq!(runtime.loaded_programs(), 2);
    assert!(runtime.has_function("double"));
}

#[test]
fn importing_the_same_file_twice_runs_it_twice() {
    let dir = TempDir::new().unwrap();
    let lib = dir.path().join("noisy.link");
    std::fs::write(&lib, "print(\"loaded\")\n").unwrap();

    let (mut runtime, output) = runtime_with_input("");
    let source = format!("import \"{0}\"\nimport \"{0}\"\n", lib.display());
    runtime.run_source(&source).unwrap();

    assert_eq!(output.contents(), "loaded\nloaded\n");
    assert_eq!(runtime.loaded_programs(), 3);
}

#[test]
fn importing_a_missing_file_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.link");
    let source = format!("import \"{}\"\nprint(\"next\")\n", missing.display());

    assert_eq!(
        run(&source),
        format!(
            "Runtime Error: Cannot import '{}'. File not found.\nnext\n",
            missing.display()
        )
    );
}

#[test]
fn parse_errors_in_imports_point_at_the_imported_file() {
    let dir = TempDir::new().unwrap();
    let broken = dir.path().join("broken.link");
    std::fs::write(&broken, "x = (1 + 2\n").unwrap();

    let (mut runtime, output) = runtime_with_input("");
    let source = format!("import \"{}\"\nprint(\"never\")\n", broken.display());
    let error = runtime.run_source(&source).unwrap_err();

    assert_eq!(error.kind, ErrorKind::ParseError);
    let origin = error.origin.expect("import errors carry their file");
    assert_eq!(origin.filename, broken.display().to_string());
    assert_eq!(output.contents(), "");
}

// ============================================================================
// Built-ins
// ============================================================================

#[test]
fn string_builtins() {
    let source = r#"
print(str.trim("  hi  "))
print(str.replace("a-b-c", "-", "+"))
parts = str.split("x,y,z", ",")
print(len(parts))
print(str.merge(parts, "/"))
print(str.merge([1, 2.5, true, "z"], "-"))
print(str.contains("haystack", "st"))
print(str.len("héllo"))
"#;
    assert_eq!(run(source), "hi\na+b+c\n3\nx/y/z\n1-2.5-z\ntrue\n5\n");
}

#[test]
fn missing_arguments_yield_defaults() {
    assert_eq!(
        run("print(len())\nprint(str.trim())\nprint(math.sqrt())\nprint(range())"),
        "0\n\n0.0\n[]\n"
    );
}

#[cfg(unix)]
#[test]
fn exec_in_expression_position_captures_output() {
    assert_eq!(run("out = os.exec(\"echo hi\")\nprint(str.trim(out))"), "hi\n");
}

#[test]
fn environment_variables_round_trip() {
    let source = r#"
os.setenv("LINKLANG_TEST_VALUE", "present")
print(os.getenv("LINKLANG_TEST_VALUE"))
"#;
    assert_eq!(run(source), "present\n");
}

#[test]
fn input_reads_typed_values() {
    let (mut runtime, output) = runtime_with_input("3.5\n42\nhello\n");
    let source = r#"
a = input("? ")
b = input()
c = input()
d = input()
print(a + 1)
print(b + 1)
print(c)
print(d)
"#;
    runtime.run_source(source).unwrap();
    assert_eq!(output.contents(), "? 4.5\n43\nhello\nnil\n");
}

#[test]
fn clear_writes_the_ansi_sequence() {
    assert_eq!(run("cls"), "\x1b[2J\x1b[H");
}

// ============================================================================
// Embedding API
// ============================================================================

#[test]
fn connections_fire_on_emit_and_properties_are_recorded() {
    let source = r#"
func on_load()
    print("loaded")
connect Main.load -> on_load
app Main
    title "Demo"
window Settings
    print("opened")
"#;
    let (mut runtime, output) = runtime_with_input("");
    runtime.run_source(source).unwrap();
    assert_eq!(output.contents(), "opened\n");

    runtime.emit("Main", "load").unwrap();
    runtime.emit("Main", "unload").unwrap();

    assert_eq!(output.contents(), "opened\nloaded\n");
    assert_eq!(runtime.property("title"), Some("Demo"));
    assert_eq!(runtime.connections().len(), 1);
}

#[test]
fn debug_ast_dump_is_written_to_the_console() {
    let (mut runtime, output) = runtime_with_input("");
    assert!(linklang::run(&mut runtime, "print(1)\n", None, true));

    let printed = output.contents();
    assert!(printed.starts_with("--- AST ---\n"), "got: {}", printed);
    assert!(printed.ends_with("-----------\n1\n"), "got: {}", printed);
}

#[test]
fn failed_console_writes_do_not_stop_the_script() {
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let mut runtime = Runtime::with_console(Console::new(ClosedPipe, Cursor::new(Vec::new())));
    runtime.run_source("print(1)\nx = 2\nprint(x)\n").unwrap();
    assert_eq!(runtime.global("x"), Some(Value::Int(2)));
}

#[test]
fn globals_persist_across_units() {
    let (mut runtime, output) = runtime_with_input("");
    runtime.run_source("x = 1\nfunc bump()\n    return x + 1").unwrap();
    runtime.run_source("print(bump())").unwrap();

    assert_eq!(output.contents(), "2\n");
    assert_eq!(runtime.global("x"), Some(Value::Int(1)));
    assert_eq!(runtime.loaded_programs(), 2);
}

#[test]
fn repl_echoes_expressions_and_buffers_blocks() {
    let input = "x = 2\nx * 3\nx\nif x > 1\n    print(\"big\")\n\nexit\n";
    let (mut runtime, output) = runtime_with_input(input);
    linklang::repl::start(&mut runtime, false);

    let text = output.contents();
    assert!(text.contains("link> 6\n"), "{}", text);
    assert!(text.contains("link> 2\n"), "{}", text);
    assert!(text.contains("big\n"), "{}", text);
    assert_eq!(runtime.global("x"), Some(Value::Int(2)));
}
