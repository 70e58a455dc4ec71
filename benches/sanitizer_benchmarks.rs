//! Benchmarks for the generated-code sanitizer.
//!
//! The sanitizer runs on every successful stage-2 reply, so its cost is
//! paid once per request; these benches keep an eye on the blocklist scan.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use mindviz::sanitize::sanitize_code;

fn benign_scene(lines: usize) -> String {
    let mut code = String::from("const scene = new THREE.Scene();\n");
    for i in 0..lines {
        code.push_str(&format!(
            "const mesh{i} = new THREE.Mesh(new THREE.SphereGeometry({i}.0, 16, 16));\n\
             scene.add(mesh{i});\n"
        ));
    }
    code
}

fn tainted_scene(lines: usize) -> String {
    let mut code = benign_scene(lines);
    for _ in 0..8 {
        code.push_str("localStorage.setItem('k','v');\nfetch('/exfil');\n");
    }
    code
}

fn bench_sanitizer(c: &mut Criterion) {
    let clean = benign_scene(100);
    let tainted = tainted_scene(100);

    c.bench_function("sanitize_clean_scene", |b| {
        b.iter(|| sanitize_code(black_box(&clean)));
    });

    c.bench_function("sanitize_tainted_scene", |b| {
        b.iter(|| sanitize_code(black_box(&tainted)));
    });
}

criterion_group!(benches, bench_sanitizer);
criterion_main!(benches);
