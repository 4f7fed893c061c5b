use std::convert::Infallible;
use std::f32::consts::PI;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mt_core::{
    Column, Event, FixedQuality, IsolationType, Muon, MuonWriter, Quality, Row, TableSink,
    TrackParticle, Vertex, WriterConfig, muon_columns,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Accepts and drops every row, so only selection and emission are timed.
struct DiscardSink {
    columns: Vec<Column>,
    shape: Vec<usize>,
}

impl TableSink for DiscardSink {
    type Error = Infallible;

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn write_rows(&mut self, rows: &[Row]) -> Result<(), Infallible> {
        black_box(rows);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

fn make_event(rng: &mut SmallRng, n_muons: usize) -> Event {
    let muons = (0..n_muons)
        .map(|_| {
            Muon::new(
                rng.random_range(3_000.0..100_000.0),
                rng.random_range(-2.5..2.5),
                rng.random_range(-PI..PI),
            )
            .with_track(TrackParticle::new(
                rng.random_range(-0.1..0.1),
                rng.random_range(-50.0..50.0),
                0.0004,
            ))
            .with_isolation(IsolationType::Ptcone20, rng.random_range(0.0..500.0))
        })
        .collect();
    let vertices = (0..30)
        .map(|_| Vertex::new(rng.random_range(-100.0..100.0)))
        .collect();
    Event::new(muons, vertices)
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("muon_writer");
    let mut rng = SmallRng::seed_from_u64(7);

    for n_muons in [0usize, 3, 20, 60] {
        let event = make_event(&mut rng, n_muons);
        group.bench_with_input(BenchmarkId::new("write", n_muons), &event, |b, event| {
            let config = WriterConfig::default();
            let sink = DiscardSink {
                columns: muon_columns(),
                shape: vec![config.max_slots],
            };
            let mut writer =
                MuonWriter::new(config, Box::new(FixedQuality(Quality::Tight)), sink).unwrap();
            b.iter(|| writer.write(black_box(event)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_write);
criterion_main!(benches);
