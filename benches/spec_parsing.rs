//! Benchmarks for update and repository spec parsing.
//!
//! Specs are parsed once per run, but large fleets pass hundreds of
//! `--repo` values and updaters compile regexes at parse time.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use repo_scribe::target::resolve_targets;
use repo_scribe::updater::parse_updater;

const EXEC: &str = "exec(cmd=make,args=generate lint,dir=tools)";
const REGEX: &str = r"regex(file=**/*.tf,pattern='version\s*=\s*\x22([^\x22]+)\x22')=1.4.2";
const YQ: &str = r#"yq(file=deploy/*.yaml,expression=.spec.template.spec.containers[].image)="ghcr.io/acme/app:1.2.3""#;
const HELM_WITH_VALUER: &str = "helm(file=charts/*/Chart.yaml,dependency=redis)=file(path=VERSION)";

fn generate_repos(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("acme/service-{}(draft={},merge=false)", i, i % 2 == 0))
        .collect()
}

fn bench_updater_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("updater_parsing");

    group.bench_function("exec", |b| b.iter(|| parse_updater(black_box(EXEC))));
    group.bench_function("regex", |b| b.iter(|| parse_updater(black_box(REGEX))));
    group.bench_function("yq", |b| b.iter(|| parse_updater(black_box(YQ))));
    group.bench_function("helm_with_valuer", |b| {
        b.iter(|| parse_updater(black_box(HELM_WITH_VALUER)))
    });

    group.finish();
}

fn bench_repository_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("repository_scaling");

    for count in [10, 100, 1000] {
        let specs = generate_repos(count);
        group.bench_with_input(BenchmarkId::new("literals", count), &specs, |b, specs| {
            b.iter(|| resolve_targets(black_box(specs), None))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_updater_parsing, bench_repository_scaling);
criterion_main!(benches);
