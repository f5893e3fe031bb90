//! Benchmarks for image construction.
//!
//! Builds a synthetic assembly with many types and methods so that symbol resolution, body
//! encoding and table serialization all show up in the profile.

extern crate cilpack;

use cilpack::prelude::*;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

/// `types` types with `methods` static methods each; every method stores a literal into a
/// static field and calls its neighbour.
fn synthetic_assembly(types: usize, methods: usize) -> Assembly {
    let mut assembly = Assembly::new("Bench");
    assembly
        .references
        .push(AssemblyName::new("mscorlib", Version::new(1, 0, 0, 0)));

    for t in 0..types {
        let name = TypeName::new("Bench", "Bench.Generated", format!("Type{t}"));
        let field = FieldDefinition::new("state", FieldAttributes::STATIC, TypeSig::I4);
        let field_ref = field.to_ref(&name);

        let mut ty = TypeDefinition::new(name.clone());
        ty.base = Some(TypeName::new("mscorlib", "System", "Object"));
        ty.fields.push(field);

        for m in 0..methods {
            let callee = MethodRef::new(
                name.clone(),
                format!("Method{}", (m + 1) % methods),
                MethodSig::static_(TypeSig::Void, vec![]),
            );
            ty.methods.push(
                MethodDefinition::new(
                    format!("Method{m}"),
                    MethodAttributes::STATIC,
                    MethodSig::static_(TypeSig::Void, vec![]),
                )
                .with_body(MethodBody::from_instructions(
                    vec![],
                    vec![
                        (OpCode::LDSTR, Operand::String(format!("literal {t}.{m}"))),
                        (OpCode::POP, Operand::None),
                        (OpCode::LDC_I4, Operand::Int32(m as i32)),
                        (OpCode::STSFLD, Operand::Field(field_ref.clone())),
                        (OpCode::CALL, Operand::Method(callee)),
                        (OpCode::RET, Operand::None),
                    ],
                )),
            );
        }
        assembly.types.push(ty);
    }
    assembly
}

/// Benchmark a small build dominated by fixed costs.
fn bench_build_small(c: &mut Criterion) {
    let assembly = synthetic_assembly(4, 4);

    c.bench_function("build_small", |b| {
        b.iter(|| {
            let image = ImageBuilder::new(black_box(&assembly), BuildOptions::default())
                .build()
                .unwrap();
            black_box(image)
        });
    });
}

/// Benchmark a build with a thousand method bodies.
fn bench_build_large(c: &mut Criterion) {
    let assembly = synthetic_assembly(40, 25);

    c.bench_function("build_large", |b| {
        b.iter(|| {
            let image = ImageBuilder::new(black_box(&assembly), BuildOptions::default())
                .build()
                .unwrap();
            black_box(image)
        });
    });
}

/// Benchmark rendering the debug map of the large build.
fn bench_debug_map_xml(c: &mut Criterion) {
    let assembly = synthetic_assembly(40, 25);
    let image = ImageBuilder::new(&assembly, BuildOptions::default())
        .build()
        .unwrap();

    c.bench_function("debug_map_xml", |b| {
        b.iter(|| black_box(image.debug_map_xml().unwrap()));
    });
}

criterion_group!(
    benches,
    bench_build_small,
    bench_build_large,
    bench_debug_map_xml
);
criterion_main!(benches);
