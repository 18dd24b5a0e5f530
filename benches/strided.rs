use std::sync::Arc;

use criterion::{
    criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion, PlotConfiguration,
    Throughput,
};
use zarrs_mdarray::{
    array::{ArrayBuilder, NumericType},
    group::{Group, HierarchyOptions, ZarrVersion},
    storage::store::MemoryStore,
};

fn strided_read_write(c: &mut Criterion) {
    let plot_config = PlotConfiguration::default().summary_scale(AxisScale::Logarithmic);
    let mut group = c.benchmark_group("strided");
    group.plot_config(plot_config);

    for size in [64u64, 128, 256] {
        let mut options = HierarchyOptions::default();
        options.set_create_consolidated_metadata(false);
        let root =
            Group::create_root(Arc::new(MemoryStore::new()), ZarrVersion::V2, options).unwrap();
        let y = root.create_dimension("y", size, None, None).unwrap();
        let x = root.create_dimension("x", size, None, None).unwrap();
        let array = root
            .create_array(
                "a",
                ArrayBuilder::new(vec![y, x], NumericType::Float32.into())
                    .block_shape(vec![32, 32]),
            )
            .unwrap();
        let count = usize::try_from(size).unwrap();
        let num_elements = count * count;
        let elements: Vec<f32> = (0..num_elements).map(|i| i as f32).collect();

        group.throughput(Throughput::Bytes((num_elements * 4) as u64));
        group.bench_function(BenchmarkId::new("write_f32", size), |b| {
            b.iter(|| {
                array
                    .write_region(&[0, 0], &[count, count], &elements)
                    .unwrap();
                array.flush().unwrap();
            });
        });
        group.bench_function(BenchmarkId::new("read_f32", size), |b| {
            b.iter(|| array.read_region::<f32>(&[0, 0], &[count, count]).unwrap());
        });
        group.bench_function(BenchmarkId::new("read_f64", size), |b| {
            b.iter(|| array.read_region::<f64>(&[0, 0], &[count, count]).unwrap());
        });
        group.bench_function(BenchmarkId::new("read_transposed_f32", size), |b| {
            let mut buffer = vec![0f32; num_elements];
            let stride = isize::try_from(count).unwrap();
            b.iter(|| {
                array
                    .read(&[0, 0], &[count, count], &[1, 1], &[1, stride], &mut buffer)
                    .unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, strided_read_write);
criterion_main!(benches);
