// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use criterion::{Criterion, criterion_group, criterion_main};
use syslib_ipc::{CriticalSection, Mutex, RwLock};

fn rw_lock_read_uncontended(c: &mut Criterion) {
    let lock = RwLock::new(0_usize);

    c.bench_function("rw_lock_read_uncontended", |b| {
        b.iter(|| *black_box(&lock).read());
    });
}

fn rw_lock_write_uncontended(c: &mut Criterion) {
    let lock = RwLock::new(0_usize);

    c.bench_function("rw_lock_write_uncontended", |b| {
        b.iter(|| *black_box(&lock).write() += 1);
    });
}

fn rw_lock_read_with_background_writer(c: &mut Criterion) {
    let lock = RwLock::new(0_usize);
    let stop = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                *lock.write() += 1;
                thread::yield_now();
            }
        });

        c.bench_function("rw_lock_read_with_background_writer", |b| {
            b.iter(|| *black_box(&lock).read());
        });

        stop.store(true, Ordering::Relaxed);
    });
}

fn mutex_uncontended(c: &mut Criterion) {
    let lock = Mutex::new(0_usize);

    c.bench_function("mutex_uncontended", |b| {
        b.iter(|| *black_box(&lock).lock() += 1);
    });
}

fn critical_section_reentry(c: &mut Criterion) {
    let cs = CriticalSection::new(0_usize);
    let _outer = cs.enter();

    c.bench_function("critical_section_reentry", |b| {
        b.iter(|| *black_box(&cs).enter());
    });
}

criterion_group!(
    name = time;
    config = Criterion::default();
    targets = rw_lock_read_uncontended,
        rw_lock_write_uncontended,
        rw_lock_read_with_background_writer,
        mutex_uncontended,
        critical_section_reentry
);
criterion_main!(time);
