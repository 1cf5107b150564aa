// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use syslib_ipc::{Condvar, CriticalSection, InitOnce, Mutex, RwLock, Semaphore, error, pipe};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_ids(true)
        .set_default()
}

/// A bounded queue in the classic monitor style: one critical section, two condition variables.
struct Queue {
    items: CriticalSection<RefCell<VecDeque<u32>>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl Queue {
    fn push(&self, item: u32) {
        let mut guard = self.items.enter();
        self.not_full
            .wait_while(&mut guard, |items| items.borrow().len() >= self.capacity);
        guard.borrow_mut().push_back(item);
        self.not_empty.notify_one();
    }

    fn pop(&self) -> u32 {
        let mut guard = self.items.enter();
        self.not_empty
            .wait_while(&mut guard, |items| items.borrow().is_empty());
        let item = guard.borrow_mut().pop_front().unwrap();
        self.not_full.notify_one();
        item
    }
}

#[test]
fn bounded_queue_delivers_every_item() {
    let _trace = init_tracing();

    let queue = Queue {
        items: CriticalSection::try_new(RefCell::default()).unwrap(),
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
        capacity: 4,
    };

    let sum = thread::scope(|s| {
        for p in 0..3 {
            let queue = &queue;
            s.spawn(move || {
                for i in 0..100 {
                    queue.push(p * 100 + i);
                }
            });
        }

        (0..300).map(|_| queue.pop()).sum::<u32>()
    });

    assert_eq!(sum, (0..300).sum());
}

#[test]
fn pipe_between_threads_with_one_time_setup() {
    static SETUP: InitOnce = InitOnce::new();
    static SETUPS: AtomicUsize = AtomicUsize::new(0);

    let (mut reader, writer) = pipe().unwrap();

    thread::scope(|s| {
        for chunk in 0..4_u8 {
            let writer = &writer;
            s.spawn(move || {
                SETUP
                    .call(|| {
                        SETUPS.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
                // writes of at most PIPE_BUF bytes are atomic
                let mut w = writer;
                w.write_all(&[chunk; 16]).unwrap();
            });
        }
    });
    drop(writer);

    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).unwrap();

    assert_eq!(SETUPS.load(Ordering::SeqCst), 1);
    assert_eq!(bytes.len(), 64);
    for chunk in bytes.chunks(16) {
        assert!(chunk.iter().all(|b| *b == chunk[0]));
    }
}

#[test]
fn locks_compose() {
    let config = Arc::new(RwLock::new(String::from("v1")));
    let log = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let config = config.clone();
            let log = log.clone();
            thread::spawn(move || {
                if i == 0 {
                    *config.write() = String::from("v2");
                }
                let seen = config.read().clone();
                log.lock().push(seen);
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let log = log.lock();
    assert_eq!(log.len(), 4);
    assert!(log.iter().all(|v| v == "v1" || v == "v2"));
    assert_eq!(*config.read(), "v2");
}

#[test]
fn failures_land_in_the_error_context() {
    let err = Semaphore::open("/ipc_integration_missing").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);

    let code = error::last_error();
    assert_eq!(Some(code), err.raw_os_error());

    let mut buf = [0; 128];
    let text = error::error_text(code, &mut buf);
    assert!(!text.is_empty());

    // other threads have their own context
    let other = thread::spawn(error::last_error).join().unwrap();
    assert_ne!(other, code);
}

#[cfg(target_os = "linux")]
#[test]
fn blocked_read_survives_signal() {
    use std::os::unix::thread::JoinHandleExt;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use syslib_ipc::signal::{self, SigHandler};

    static DELIVERED: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_signal(_: libc::c_int) {
        DELIVERED.store(true, Ordering::SeqCst);
    }

    // Safety: the handler only touches an atomic
    let prev = unsafe { signal::register(libc::SIGUSR2, SigHandler::Handler(on_signal)).unwrap() };

    let (mut reader, mut writer) = pipe().unwrap();
    let blocked = thread::spawn(move || {
        let mut buf = [0; 4];
        // with SA_RESTART the read resumes after the handler instead of failing with EINTR.
        // `read_exact` would retry on EINTR by itself, so this has to be a single `read`.
        let n = reader.read(&mut buf)?;
        Ok::<_, io::Error>(buf[..n].to_vec())
    });

    thread::sleep(Duration::from_millis(50));
    // Safety: the thread is still running, it is blocked in `read`
    assert_eq!(
        unsafe { libc::pthread_kill(blocked.as_pthread_t(), libc::SIGUSR2) },
        0
    );
    while !DELIVERED.load(Ordering::SeqCst) {
        thread::yield_now();
    }

    writer.write_all(b"ping").unwrap();
    assert_eq!(blocked.join().unwrap().unwrap(), b"ping");

    // Safety: restoring the previous disposition
    unsafe { signal::register(libc::SIGUSR2, prev).unwrap() };
}
