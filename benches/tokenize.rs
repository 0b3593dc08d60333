//! Benchmarks for rule compilation and tokenization throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lexdfa::Tokenizer;

const WHITESPACE: i32 = 0;
const COMMENT: i32 = 1;
const WORD: i32 = 2;
const DIRECTIVE: i32 = 3;
const HEX: i32 = 4;
const DECIMAL: i32 = 5;
const OCTAL: i32 = 6;
const BINARY: i32 = 7;
const STRING: i32 = 8;
const MALFORMED_HEX: i32 = -2;
const MALFORMED_DECIMAL: i32 = -3;

fn assembler() -> Tokenizer {
    let mut t = Tokenizer::new();
    t.add_ignored_rule(Tokenizer::WHITESPACE_RULE, WHITESPACE).unwrap();
    t.add_ignored_rule(";[^\n]*\n?", COMMENT).unwrap();
    t.add_rule(Tokenizer::WORD_RULE, WORD).unwrap();
    t.add_rule(r"\.[\w]+", DIRECTIVE).unwrap();
    t.add_rule(Tokenizer::HEX_RULE, HEX).unwrap();
    t.add_rule(Tokenizer::DECIMAL_RULE, DECIMAL).unwrap();
    t.add_rule(Tokenizer::OCTAL_RULE, OCTAL).unwrap();
    t.add_rule(Tokenizer::BINARY_RULE, BINARY).unwrap();
    t.add_rule(Tokenizer::MALFORMED_HEX_RULE, MALFORMED_HEX).unwrap();
    t.add_rule(Tokenizer::MALFORMED_DECIMAL_RULE, MALFORMED_DECIMAL).unwrap();
    t.add_rule(Tokenizer::DQ_STRING_RULE, STRING).unwrap();
    t
}

fn bench_compile_rules(c: &mut Criterion) {
    c.bench_function("compile_rules", |b| b.iter(assembler));
}

fn bench_single_word(c: &mut Criterion) {
    let mut t = assembler();
    c.bench_function("tokenize_word", |b| {
        b.iter(|| {
            let mut tokens = Vec::new();
            t.tokenize(black_box("some_identifier_42"), &mut tokens);
            tokens
        })
    });
}

fn bench_mixed_stream(c: &mut Criterion) {
    let mut t = assembler();
    let line = ".data 0x1234567890abcdef -42 \"a string, with\\ttext\" label ; trailing comment\n";
    let input: String = std::iter::repeat(line).take(200).collect();
    c.bench_function("tokenize_mixed_stream", |b| {
        b.iter(|| {
            let mut tokens = Vec::new();
            t.tokenize(black_box(&input), &mut tokens);
            tokens
        })
    });
}

criterion_group!(
    benches,
    bench_compile_rules,
    bench_single_word,
    bench_mixed_stream
);
criterion_main!(benches);
