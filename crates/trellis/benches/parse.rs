use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use trellis::Engine;

fn inputs() -> Vec<(&'static str, String)> {
    let mut flowchart = String::from("flowchart TD\n");
    for i in 0..200 {
        flowchart.push_str(&format!("N{i}[Node {i}] -->|step| N{}\n", i + 1));
    }

    let mut sequence = String::from("sequenceDiagram\n");
    for i in 0..200 {
        sequence.push_str(&format!("A->>+B: call {i}\nB-->>-A: reply {i}\n"));
    }

    let mut git = String::from("gitGraph\n");
    for i in 0..50 {
        git.push_str(&format!(
            "commit\nbranch f{i}\ncommit\ncommit\ncheckout main\nmerge f{i}\n"
        ));
    }

    let mut mindmap = String::from("mindmap\n  root\n");
    for i in 0..100 {
        mindmap.push_str(&format!("    child{i}\n      leaf{i}\n"));
    }

    vec![
        ("flowchart", flowchart),
        ("sequence", sequence),
        ("gitGraph", git),
        ("mindmap", mindmap),
        (
            "er",
            "erDiagram\nCUSTOMER ||--o{ ORDER : places\nORDER ||--|{ LINE_ITEM : contains\n"
                .to_string(),
        ),
    ]
}

fn bench_parse(c: &mut Criterion) {
    let engine = Engine::new();

    let mut group = c.benchmark_group("parse");
    for (name, input) in inputs() {
        group.bench_function(name, |b| {
            b.iter(|| engine.parse(black_box(&input)).unwrap());
        });
    }
    group.finish();
}

fn bench_parse_known_type(c: &mut Criterion) {
    let engine = Engine::new();

    let mut group = c.benchmark_group("parse_known_type");
    for (name, input) in inputs() {
        let diagram_type = engine.parse_metadata(&input).unwrap().diagram_type;
        group.bench_function(name, |b| {
            b.iter(|| engine.parse_as(&diagram_type, black_box(&input)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_parse_known_type);
criterion_main!(benches);
