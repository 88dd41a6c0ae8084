use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use frugal_ssa::ir::{BinaryOp, IrBuilder, IrFunction, IrSwitch, IrTerminator};
use frugal_ssa::passes::PassPipeline;
use frugal_ssa::reg::{HirReg, Reg};
use frugal_ssa::BlockId;

fn bench_register_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("reg");

    group.bench_function("make", |b| {
        b.iter(|| Reg::make(black_box(true), black_box(3), black_box(1234)))
    });

    let reg = Reg::norm(true, 17);
    group.bench_function("rename", |b| b.iter(|| black_box(reg).rename(black_box(99))));
    group.bench_function("normalize", |b| b.iter(|| black_box(reg).normalize(black_box(7))));
    group.bench_function("display", |b| b.iter(|| black_box(reg).to_string()));

    group.finish();
}

fn bench_successors(c: &mut Criterion) {
    let mut group = c.benchmark_group("successors");

    for cases in [2usize, 16, 128] {
        let sw = IrSwitch::new(
            Reg::norm(false, 0),
            BlockId(0),
            (0..cases).map(|i| (i as i64, BlockId(i as u32 + 1))),
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::new("switch", cases), &sw, |b, sw| {
            b.iter(|| sw.successors().count())
        });
    }

    group.finish();
}

/// A chain of `n` diamonds, each redefining the same front-end register
fn diamonds(n: usize) -> IrFunction {
    let v = Reg::try_from(HirReg::R(1)).unwrap();
    let a = Reg::try_from(HirReg::R(0)).unwrap();
    let mut func = IrFunction::new("diamonds");
    let mut b = IrBuilder::new(&mut func);
    b.load_arg(a, 0).unwrap();
    b.const_int(v, 0).unwrap();
    for _ in 0..n {
        let (l, r, join) = (b.create_block(), b.create_block(), b.create_block());
        b.switch(a, r, [(0, l)]).unwrap();
        b.switch_to_block(l).unwrap();
        b.binary(BinaryOp::Add, v, v, a).unwrap();
        b.jump(join).unwrap();
        b.switch_to_block(r).unwrap();
        b.binary(BinaryOp::Sub, v, v, a).unwrap();
        b.jump(join).unwrap();
        b.switch_to_block(join).unwrap();
    }
    b.ret(vec![v]).unwrap();
    func
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let pipeline = PassPipeline::default();

    for n in [4usize, 32, 128] {
        let func = diamonds(n);
        group.bench_with_input(BenchmarkId::new("diamonds", n), &func, |b, func| {
            b.iter(|| {
                let mut f = func.clone();
                pipeline.run(&mut f).unwrap();
                f
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_register_transforms, bench_successors, bench_pipeline);
criterion_main!(benches);
