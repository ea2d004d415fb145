//! Benchmark suite for pulpit-algo
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pulpit_algo::dedup::{ReferencePolicy, ReferenceSet};
use pulpit_algo::{Book, GradeResult, GradeStatus, NextBatch, PracticeItem, PracticeQueue};

fn book(size: u32) -> Book {
    Book::new(
        (1..=size)
            .map(|id| PracticeItem::new(id, format!("短语{id}"), format!("phrase {id}")))
            .collect(),
    )
    .expect("valid bench book")
}

/// Drives a queue to mastery, failing every third item once.
fn run_to_mastery(book: &Book, batch_size: usize) -> u32 {
    let mut queue = PracticeQueue::new();
    queue.load(book);
    let mut rounds = 0;

    while let Ok(NextBatch::Ready { items, .. }) = queue.next_batch(batch_size) {
        let first_cycle = queue.recycles() == 0;
        let results: Vec<_> = items
            .iter()
            .map(|item| {
                let status = if item.id % 3 == 0 && first_cycle {
                    GradeStatus::Fail
                } else {
                    GradeStatus::Pass
                };
                GradeResult::new(item.id, status, "spoken", "")
            })
            .collect();
        if queue.apply_results(results).is_err() {
            break;
        }
        rounds += 1;
    }

    rounds
}

fn bench_queue_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("PracticeQueue::run_to_mastery");
    for size in [30u32, 300, 3000] {
        let book = book(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &book, |b, book| {
            b.iter(|| run_to_mastery(black_box(book), 5))
        });
    }
    group.finish();
}

fn bench_check_invariant(c: &mut Criterion) {
    let book = book(300);
    let mut queue = PracticeQueue::new();
    queue.load(&book);
    let _ = queue.next_batch(5);

    c.bench_function("PracticeQueue::check_invariant", |b| {
        b.iter(|| black_box(&queue).check_invariant())
    });
}

fn bench_reference_set(c: &mut Criterion) {
    let refs: Vec<String> = (1..=200).map(|v| format!("Gen {}:{}", v / 30 + 1, v % 30 + 1)).collect();

    for policy in [ReferencePolicy::Normalized, ReferencePolicy::Containment] {
        c.bench_function(&format!("ReferenceSet::insert/{policy}"), |b| {
            b.iter(|| {
                let mut set = ReferenceSet::new(policy);
                for r in &refs {
                    set.insert(black_box(r));
                }
                set.len()
            })
        });
    }
}

criterion_group!(benches, bench_queue_cycle, bench_check_invariant, bench_reference_set);
criterion_main!(benches);
