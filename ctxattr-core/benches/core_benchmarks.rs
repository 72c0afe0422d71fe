use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ctxattr_core::AttributeContextArgs;
use ctxattr_core::template::infill;

fn bench_validate(c: &mut Criterion) {
    let mut args = AttributeContextArgs::new("The quick brown fox jumps over the lazy dog.");
    args.input.input_context_text = Some("A story about animals.".into());
    args.input.output_template = Some("{current}</s>".into());

    c.bench_function("validate_with_input_context", |b| {
        b.iter(|| black_box(args.clone()).validate())
    });

    let plain = AttributeContextArgs::new("Hello");
    c.bench_function("validate_current_only", |b| {
        b.iter(|| black_box(plain.clone()).validate())
    });
}

fn bench_infill(c: &mut Criterion) {
    let context = "word ".repeat(500);
    c.bench_function("infill_long_context", |b| {
        b.iter(|| {
            infill(
                black_box("<user>\n{context}\n{current}\n<assistant>"),
                Some(&context),
                black_box("What happened next?"),
            )
        })
    });
}

criterion_group!(benches, bench_validate, bench_infill);
criterion_main!(benches);
