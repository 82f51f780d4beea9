//! End-to-end scenarios exercising the compiler pipeline and VM together.

use pretty_assertions::assert_eq;

use knight::Interpreter;

fn capture(source: &str) -> knight::Captured {
    Interpreter::new().capture(source).unwrap()
}

#[test]
fn dump_of_zero() {
    let out = capture("D 0");
    assert_eq!(out.text, "0");
    assert_eq!(out.exit_code, None);
}

#[test]
fn sequence_then_assignment_then_load() {
    let out = capture("D ; = a 3 : a");
    assert_eq!(out.text, "3");
}

#[test]
fn blocks_are_globally_scoped_not_captured() {
    // The classic scoping probe: the BLOCK body mutates the same global
    // slots `a`/`c`/`d`/`e`/`f` as the surrounding program, and only runs
    // at CALL time, not at BLOCK time.
    let source = "D ; = a 1 ; = b 2 ; = blk BLOCK ; = a 5 ; = c 6 ; = e 7 ; = f 8 : \
                  ++++,a,b,c,d,e ; = c 3 ; = d 4 : +CALL blk ,f";
    let out = capture(source);
    assert_eq!(out.text, "[5, 2, 6, 4, 7, 8]");
}

#[test]
fn quit_sets_exit_code_and_writes_nothing() {
    let out = capture("QUIT 42");
    assert_eq!(out.exit_code, Some(42));
    assert_eq!(out.text, "");
}

#[test]
fn output_trailing_backslash_suppresses_newline() {
    // Knight strings have no escapes: this source is literally
    // `OUTPUT "hello\` followed by the closing quote.
    let out = capture("OUTPUT \"hello\\\"");
    assert_eq!(out.text, "hello");
}

#[test]
fn while_loop_sums_zero_through_nine() {
    let source = "; = i 0 ; = sum 0 ; W (< i 10) ; = sum + sum i : = i + i 1 D sum";
    let out = capture(source);
    assert_eq!(out.text, "45");
}

#[test]
fn prompt_strips_trailing_carriage_returns() {
    let interp = Interpreter::new();
    let program = knight::compile("D PROMPT").unwrap();
    let mut text = Vec::new();
    let mut input = std::io::Cursor::new(b"foo\r\r\r\n".to_vec());
    let mut rng = rand::rngs::mock::StepRng::new(0, 1);
    interp.run_compiled(&program, &mut text, &mut input, &mut rng).unwrap();
    assert_eq!(String::from_utf8(text).unwrap(), "\"foo\"");
}

#[test]
fn string_concatenation_does_not_reuse_a_shared_buffer() {
    let source = "; = a + \"\" 12 ; = b + \"\" 34 : D + a b";
    let out = capture(source);
    assert_eq!(out.text, "\"1234\"");
}
