use dbas_lang::compile;
use dbas_lang::limits::Limits;
use dbas_lang::program::Program;
use dbas_lang::runtime::{Runtime, RuntimeError};

fn build(source: &str) -> Program {
    compile(source, &Limits::default()).unwrap()
}

fn run(program: &Program) -> (Result<i32, RuntimeError>, String, usize, usize) {
    let mut runtime = Runtime::with_io(program, &b""[..], Vec::new());
    let result = runtime.run();
    let live = runtime.live_cells();
    let reachable = runtime.reachable_from_globals().unwrap();
    let output = String::from_utf8(runtime.into_output()).unwrap();
    (result, output, live, reachable)
}

fn output_of(source: &str) -> String {
    let program = build(source);
    let (result, output, _, _) = run(&program);
    result.unwrap();
    output
}

#[test]
fn test_record_field_assignment() {
    let source = "\
type P
  dim x
  dim y
end type
dim a P
function main()
  a.y = 5
  print a.y, a.x
end function
";
    assert_eq!(output_of(source), "5 0\n");
}

#[test]
fn test_string_concatenation_and_print() {
    let source = "\
dim s string = \"ab\"
function main()
  let s = s + \"cd\"
  print s
end function
";
    assert_eq!(output_of(source), "abcd\n");
}

#[test]
fn test_push_pop_len_sequence() {
    let source = "\
dim xs int[]
function main()
  call push(xs, 7)
  call push(xs, 8)
  print len(xs)
  print pop(xs)
  print len(xs)
end function
";
    assert_eq!(output_of(source), "2\n8\n1\n");
}

#[test]
fn test_break_two_levels() {
    let source = "\
function main()
  dim i, j
  for i = 1 to 3
    for j = 1 to 3
      if j == 2
        break 2
      end if
      print i, j
    end for
    print \"never\"
  end for
  print \"done\", i
end function
";
    assert_eq!(output_of(source), "1 1\ndone 1\n");
}

#[test]
fn test_break_two_levels_from_for_inside_while() {
    let source = "\
function main()
  dim i, j
  while i != 3
    let i = i + 1
    for j = 1 to 3
      if j == 2
        break 2
      end if
      print i, j
    end for
    print \"never\"
  end while
  print \"done\", i
end function
";
    assert_eq!(output_of(source), "1 1\ndone 1\n");
}

#[test]
fn test_continue_two_levels_skips_outer_body() {
    let source = "\
function main()
  dim i, j
  while i != 3
    let i = i + 1
    for j = 1 to 3
      if j == 2
        continue 2
      end if
      print i, j
    end for
    print \"skipped\"
  end while
  print \"done\", i
end function
";
    assert_eq!(output_of(source), "1 1\n2 1\n3 1\ndone 3\n");
}

#[test]
fn test_continue_one_level() {
    let source = "\
function main()
  dim i
  for i = 1 to 5
    if i == 2 or i == 4
      continue
    end if
    print i
  end for
end function
";
    assert_eq!(output_of(source), "1\n3\n5\n");
}

#[test]
fn test_local_initializers_run_in_place() {
    let source = "\
function main()
  dim i
  for i = 1 to 3
    dim s string = \"x\"
    let s = s + \"y\"
    print s
  end for
  dim n = i
  print n
end function
";
    assert_eq!(output_of(source), "xy\nxy\nxy\n4\n");
}

#[test]
fn test_strings_passed_by_value() {
    let source = "\
dim s string = \"keep\"
function change(t string)
  let t = \"changed\"
  return len(t)
end function
function main()
  print change(s), s
end function
";
    let program = build(source);
    let (result, output, live, reachable) = run(&program);
    result.unwrap();
    assert_eq!(output, "7 keep\n");
    assert_eq!(live, 1);
    assert_eq!(reachable, 1);
}

#[test]
fn test_no_leaks_after_run() {
    let source = "\
type Node
  dim name string
  dim kids Node[]
end type
dim root Node
dim names string[]
function grow(n Node, depth int)
  dim child Node
  dim label string = \"n\"
  if depth == 0
    return 0
  end if
  let child.name = label + \"x\"
  call grow(child, depth - 1)
  call push(n.kids, child)
  call push(names, child.name)
  return 0
end function
function main()
  call grow(root, 4)
  let root = root.kids[0]
  call pop(names)
  print len(names)
end function
";
    let program = build(source);
    let (result, output, live, reachable) = run(&program);
    result.unwrap();
    assert_eq!(output, "3\n");
    // every live cell is owned by a global, nothing dangles or leaks
    assert_eq!(live, reachable);
}

#[test]
fn test_cleanup_runs_on_runtime_error() {
    let source = "\
dim xs int[]
function fail(s string)
  dim local string = \"tmp\"
  dim parts string[]
  call push(parts, s)
  return pop(xs)
end function
function main()
  call fail(\"arg\")
end function
";
    let program = build(source);
    let (result, _, live, reachable) = run(&program);
    assert!(matches!(result, Err(RuntimeError::ArrayUnderflow { .. })));
    assert_eq!(live, 1);
    assert_eq!(live, reachable);
}

#[test]
fn test_assignment_is_idempotent() {
    let source = "\
type P
  dim name string
  dim tags string[]
end type
dim a P
dim b P
function main()
  let a.name = \"x\"
  call push(a.tags, \"t\")
  let b = a
end function
";
    let program = build(source);
    let mut runtime = Runtime::with_io(&program, &b""[..], Vec::new());
    runtime.run().unwrap();
    let handle = runtime.global("b").unwrap().value;
    let once = runtime.live_cells();
    let summary_once = runtime.state_summary();

    // a second run repeats the same single assignment from a clean heap
    runtime.run().unwrap();
    assert_eq!(runtime.global("b").unwrap().value, handle);
    assert_eq!(runtime.live_cells(), once);
    assert_eq!(runtime.state_summary(), summary_once);

    let source = "\
type P
  dim name string
  dim tags string[]
end type
dim a P
dim b P
function main()
  let a.name = \"x\"
  call push(a.tags, \"t\")
  let b = a
  let b = a
  let b = b
end function
";
    let twice = build(source);
    let mut runtime = Runtime::with_io(&twice, &b""[..], Vec::new());
    runtime.run().unwrap();
    assert_eq!(runtime.global("b").unwrap().value, handle);
    assert_eq!(runtime.live_cells(), once);
    assert_eq!(runtime.reachable_from_globals().unwrap(), once);
}

#[test]
fn test_arrays_passed_by_handle() {
    let source = "\
dim xs int[]
function fill(a int[], n int)
  dim i
  for i = 1 to n
    call push(a, i * i)
  end for
end function
function main()
  call fill(xs, 4)
  print len(xs), xs[3]
end function
";
    assert_eq!(output_of(source), "4 16\n");
}

#[test]
fn test_index_out_of_range() {
    let program = build("dim xs int[]\nfunction main()\n  print xs[0]\nend function\n");
    let (result, _, _, _) = run(&program);
    assert!(matches!(
        result,
        Err(RuntimeError::OutOfRange {
            index: 0,
            len: 0,
            ..
        })
    ));
}
