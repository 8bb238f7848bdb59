use ballast::{LoadIndex, Loaded};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Instant;

// Dispatch/complete events per benchmark iteration
const TOTAL_EVENTS: usize = 1 << 16;

#[derive(Default)]
struct Slot {
    load: usize,
    position: Option<usize>,
}

impl Loaded for Slot {
    fn load(&self) -> usize {
        self.load
    }

    fn set_load(&mut self, load: usize) {
        self.load = load;
    }

    fn position(&self) -> Option<usize> {
        self.position
    }

    fn set_position(&mut self, position: Option<usize>) {
        self.position = position;
    }
}

fn pool(members: usize) -> LoadIndex<Slot> {
    let mut index = LoadIndex::with_capacity(members);
    for _ in 0..members {
        index.insert(Slot::default());
    }
    index
}

/// Alternates dispatching to the least-loaded member with completing the
/// oldest outstanding assignment, the steady state of a busy pool.
fn bench_dispatch_complete(c: &mut Criterion) {
    let mut group = c.benchmark_group("index/dispatch_complete");

    for members in [1, 4, 10, 64, 256, 1024] {
        group.throughput(Throughput::Elements(TOTAL_EVENTS as u64));
        group.bench_function(
            format!("events/{TOTAL_EVENTS}/workers/{members}"),
            |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let mut index = pool(members);
                        let mut outstanding = std::collections::VecDeque::new();

                        // Warm up to roughly four assignments per member.
                        for _ in 0..members * 4 {
                            let id = index.peek_min().unwrap();
                            index.update_and_reseat(id, 1).unwrap();
                            outstanding.push_back(id);
                        }

                        for _ in 0..TOTAL_EVENTS / 2 {
                            let id = black_box(index.peek_min().unwrap());
                            index.update_and_reseat(id, 1).unwrap();
                            outstanding.push_back(id);

                            let done = outstanding.pop_front().unwrap();
                            black_box(index.update_and_reseat(done, -1).unwrap());
                        }
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

/// Pop/push cycles, the classic heap access pattern.
fn bench_pop_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("index/pop_push");

    for members in [4, 64, 1024] {
        group.throughput(Throughput::Elements(TOTAL_EVENTS as u64));
        group.bench_function(format!("events/{TOTAL_EVENTS}/workers/{members}"), |b| {
            let mut index = pool(members);
            b.iter(|| {
                for _ in 0..TOTAL_EVENTS {
                    let id = index.pop_min();
                    index.push(black_box(id)).unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch_complete, bench_pop_push);
criterion_main!(benches);
