use crate::{
    database::{
        memory::{MemoryStore, StoreCall},
        StorageAdapters,
    },
    encoder::{MetricEncoder, WriteMode},
    ingest::{IngestError, Line, RunMetadata, Scanner},
};
use std::{collections::BTreeMap, io::Cursor};

const TIMESTAMP: i64 = 1_700_000_000_000;

const GO_OUTPUT: &str = "goos: linux
goarch: amd64
pkg: example
cpu: AMD Ryzen 7 PRO 4750U
BenchmarkFoo-8   \t 1000000\t       105 ns/op
BenchmarkBar-8   \t  500000\t      2405 ns/op\t     416 B/op\t       7 allocs/op
PASS
ok  \texample\t3.141s
";

fn memory(store: &StorageAdapters) -> &MemoryStore {
    match store {
        StorageAdapters::Memory(memory) => memory,
        other => panic!("expected the memory adapter, got {other:?}"),
    }
}

fn metadata() -> RunMetadata {
    RunMetadata::new("go1.22.1", "main", TIMESTAMP)
}

fn encoder(mode: WriteMode) -> MetricEncoder {
    MetricEncoder::new("go-bench-datasink:", BTreeMap::new(), mode)
}

fn scan(input: &str, encoder: &MetricEncoder, store: &mut StorageAdapters) -> RunMetadata {
    let mut scanner = Scanner::new(metadata(), encoder, store);

    scanner
        .run(Cursor::new(input.as_bytes().to_vec()))
        .expect("scan should succeed");

    scanner.metadata
}

#[test]
pub fn classify_metadata_lines() {
    assert_eq!(
        Line::classify("pkg: github.com/acme/widgets"),
        Line::Package("github.com/acme/widgets".to_string())
    );
    assert_eq!(Line::classify("goos:linux"), Line::Os("linux".to_string()));
    assert_eq!(
        Line::classify("goarch: \t arm64  "),
        Line::Arch("arm64".to_string())
    );
    // prefix match only, no validation of the value
    assert_eq!(Line::classify("pkg:"), Line::Package(String::new()));
}

#[test]
pub fn classify_other_lines() {
    assert_eq!(Line::classify("PASS"), Line::Ignored);
    assert_eq!(Line::classify(""), Line::Ignored);
    assert_eq!(Line::classify("cpu: Intel(R) Xeon(R)"), Line::Ignored);
    assert_eq!(Line::classify(" pkg: indented"), Line::Ignored);

    match Line::classify("BenchmarkFoo-8   1000000   105 ns/op") {
        Line::Benchmark(benchmark) => assert_eq!(benchmark.name, "BenchmarkFoo-8"),
        other => panic!("expected a benchmark, got {other:?}"),
    }
}

#[test]
pub fn end_to_end_example() {
    let encoder = encoder(WriteMode::BestEffort);
    let mut store = StorageAdapters::Memory(MemoryStore::new());

    let metadata = scan(
        "pkg: example\ngoos: linux\ngoarch: amd64\nBenchmarkFoo-8   1000000   105 ns/op\n",
        &encoder,
        &mut store,
    );

    assert_eq!(metadata.package, "example");
    assert_eq!(metadata.goos, "linux");
    assert_eq!(metadata.goarch, "amd64");

    let key = "go-bench-datasink:linux:amd64:go1.22.1:example:BenchmarkFoo-8:main:ns_per_op";
    let calls = &memory(&store).calls;

    assert_eq!(calls.len(), 3);
    assert!(matches!(&calls[0], StoreCall::CreateSeries { key: created, .. } if created == key));
    assert_eq!(
        calls[1],
        StoreCall::AddSample {
            key: key.to_string(),
            timestamp: TIMESTAMP,
            value: 105.0,
        }
    );
    assert_eq!(
        calls[2],
        StoreCall::AddBenchmarkName {
            key: "go-bench-datasink:example:benchmarks".to_string(),
            name: "BenchmarkFoo-8".to_string(),
        }
    );
}

#[test]
pub fn full_go_test_output() {
    let encoder = encoder(WriteMode::BestEffort);
    let mut store = StorageAdapters::Memory(MemoryStore::new());
    let mut scanner = Scanner::new(metadata(), &encoder, &mut store);

    scanner
        .run(Cursor::new(GO_OUTPUT.as_bytes().to_vec()))
        .expect("scan should succeed");

    let report = scanner.report;
    assert_eq!(report.lines, 8);
    assert_eq!(report.metadata_lines, 3);
    assert_eq!(report.benchmarks, 2);
    assert_eq!(report.encoded, 2);
    assert_eq!(report.ignored_lines, 3);
    assert_eq!(report.failed_writes, 0);

    let memory = memory(&store);
    assert_eq!(memory.series.len(), 2);
    assert_eq!(
        memory.sets["go-bench-datasink:example:benchmarks"]
            .iter()
            .collect::<Vec<_>>(),
        vec!["BenchmarkBar-8", "BenchmarkFoo-8"]
    );
}

#[test]
pub fn missing_ns_per_op_writes_nothing() {
    let encoder = encoder(WriteMode::BestEffort);
    let mut store = StorageAdapters::Memory(MemoryStore::new());
    let mut scanner = Scanner::new(metadata(), &encoder, &mut store);

    scanner
        .run(Cursor::new(
            b"pkg: example\nBenchmarkAlloc-8 100 416 B/op 7 allocs/op\n".to_vec(),
        ))
        .expect("scan should succeed");

    assert_eq!(scanner.report.benchmarks, 1);
    assert_eq!(scanner.report.missing_ns_per_op, 1);
    assert_eq!(scanner.report.encoded, 0);
    assert!(memory(&store).calls.is_empty());
}

#[test]
pub fn unparseable_lines_change_nothing() {
    let encoder = encoder(WriteMode::BestEffort);
    let mut store = StorageAdapters::Memory(MemoryStore::new());
    let mut scanner = Scanner::new(metadata(), &encoder, &mut store);

    scanner
        .run(Cursor::new(
            b"--- FAIL: TestThing\nBenchmarkFoo-8 many 105 ns/op\nok example 0.1s\n".to_vec(),
        ))
        .expect("scan should succeed");

    assert_eq!(scanner.metadata, metadata());
    assert_eq!(scanner.report.ignored_lines, 3);
    assert!(memory(&store).calls.is_empty());
}

#[test]
pub fn metadata_persists_until_overwritten() {
    let encoder = encoder(WriteMode::BestEffort);
    let mut store = StorageAdapters::Memory(MemoryStore::new());

    scan(
        "goos: linux\ngoarch: amd64\npkg: first\nBenchmarkA 1 1 ns/op\npkg: second\nBenchmarkB 1 2 ns/op\nBenchmarkC 1 3 ns/op\n",
        &encoder,
        &mut store,
    );

    let series: Vec<&String> = memory(&store).series.keys().collect();
    assert_eq!(
        series,
        vec![
            "go-bench-datasink:linux:amd64:go1.22.1:first:BenchmarkA:main:ns_per_op",
            "go-bench-datasink:linux:amd64:go1.22.1:second:BenchmarkB:main:ns_per_op",
            "go-bench-datasink:linux:amd64:go1.22.1:second:BenchmarkC:main:ns_per_op",
        ]
    );
}

#[test]
pub fn benchmark_before_package_uses_empty_package() {
    let encoder = encoder(WriteMode::BestEffort);
    let mut store = StorageAdapters::Memory(MemoryStore::new());

    scan("BenchmarkEarly 10 7 ns/op\n", &encoder, &mut store);

    let memory = memory(&store);
    assert!(memory
        .series
        .contains_key("go-bench-datasink:::go1.22.1::BenchmarkEarly:main:ns_per_op"));
    assert!(memory.sets.contains_key("go-bench-datasink::benchmarks"));
}

#[test]
pub fn crlf_and_invalid_utf8_are_tolerated() {
    let encoder = encoder(WriteMode::BestEffort);
    let mut store = StorageAdapters::Memory(MemoryStore::new());
    let mut scanner = Scanner::new(metadata(), &encoder, &mut store);

    let mut input = b"pkg: windows\r\ngoos: windows\r\n".to_vec();
    input.extend_from_slice(b"\xff\xfe garbage\r\n");
    input.extend_from_slice(b"BenchmarkWin 10 42 ns/op");

    scanner
        .run(Cursor::new(input))
        .expect("scan should succeed");

    assert_eq!(scanner.metadata.package, "windows");
    assert_eq!(scanner.metadata.goos, "windows");
    assert_eq!(scanner.report.lines, 4);
    assert_eq!(scanner.report.ignored_lines, 1);
    assert_eq!(scanner.report.encoded, 1);
}

#[test]
pub fn reruns_write_to_the_same_keys() {
    let encoder = encoder(WriteMode::BestEffort);
    let mut first = StorageAdapters::Memory(MemoryStore::new());
    let mut second = StorageAdapters::Memory(MemoryStore::new());

    scan(GO_OUTPUT, &encoder, &mut first);
    scan(GO_OUTPUT, &encoder, &mut second);

    assert_eq!(memory(&first).calls, memory(&second).calls);

    // a second pass over the same store keeps a single sample per series
    scan(GO_OUTPUT, &encoder, &mut first);
    let memory = memory(&first);
    assert_eq!(memory.series.len(), 2);
    assert!(memory
        .series
        .values()
        .all(|series| series.samples.len() == 1));
}

#[test]
pub fn best_effort_counts_failed_writes() {
    let encoder = encoder(WriteMode::BestEffort);
    let mut failing = MemoryStore::new();
    failing.fail_key("go-bench-datasink:example:benchmarks");
    let mut store = StorageAdapters::Memory(failing);
    let mut scanner = Scanner::new(metadata(), &encoder, &mut store);

    scanner
        .run(Cursor::new(GO_OUTPUT.as_bytes().to_vec()))
        .expect("best effort never fails on writes");

    assert_eq!(scanner.report.encoded, 2);
    assert_eq!(scanner.report.failed_writes, 2);
    assert_eq!(memory(&store).calls.len(), 6);
}

#[test]
pub fn strict_aborts_on_first_failed_write() {
    let encoder = encoder(WriteMode::Strict);
    let mut failing = MemoryStore::new();
    failing.fail_key("go-bench-datasink:linux:amd64:go1.22.1:example:BenchmarkFoo-8:main:ns_per_op");
    let mut store = StorageAdapters::Memory(failing);
    let mut scanner = Scanner::new(metadata(), &encoder, &mut store);

    let result = scanner.run(Cursor::new(GO_OUTPUT.as_bytes().to_vec()));

    assert!(matches!(result, Err(IngestError::Store(_))));
    // metadata read so far is still available for the summary
    assert_eq!(scanner.metadata.package, "example");
    assert_eq!(memory(&store).calls.len(), 1);
}

#[test]
pub fn invalid_utf8_in_names_is_replaced_in_keys() {
    let encoder = encoder(WriteMode::BestEffort);
    let mut store = StorageAdapters::Memory(MemoryStore::new());
    let mut scanner = Scanner::new(metadata(), &encoder, &mut store);

    scanner
        .run(Cursor::new(b"pkg: example\nBenchmark\xffRaw 10 7 ns/op\n".to_vec()))
        .expect("scan should succeed");

    assert!(memory(&store)
        .series
        .contains_key("go-bench-datasink:::go1.22.1:example:Benchmark\u{fffd}Raw:main:ns_per_op"));
}
