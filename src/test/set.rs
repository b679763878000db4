//! Testing utilities for set types.

use core::fmt::Debug;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::thread::scope;

use rand::prelude::*;

use crate::test::RandGen;
use crate::ConcurrentSet;

/// Runs many operations in a single thread and tests if it works like a set data structure using
/// `std::collections::BTreeSet` as reference.
pub fn stress_sequential<T: Clone + Debug + Ord + RandGen, S: Default + ConcurrentSet<T>>(
    steps: usize,
) {
    enum Ops {
        ContainsSome,
        ContainsNone,
        Insert,
        DeleteSome,
        DeleteNone,
    }
    const OPS: [Ops; 5] = [
        Ops::ContainsSome,
        Ops::ContainsNone,
        Ops::Insert,
        Ops::DeleteSome,
        Ops::DeleteNone,
    ];

    let mut rng = thread_rng();
    let set = S::default();
    let mut reference = BTreeSet::new();

    for i in 0..steps {
        let op = OPS.choose(&mut rng).unwrap();

        match op {
            Ops::ContainsSome => {
                let Some(value) = reference.iter().choose(&mut rng) else {
                    continue;
                };

                println!("iteration {i}: contains({value:?}) (existing)");

                assert_eq!(set.contains(value), Ok(true));
            }
            Ops::ContainsNone => {
                let value = T::rand_gen(&mut rng);
                let expected = reference.contains(&value);
                let non = if expected { "" } else { "non-" };

                println!("iteration {i}: contains({value:?}) ({non}existing)");

                assert_eq!(set.contains(&value), Ok(expected));
            }
            Ops::Insert => {
                let value = T::rand_gen(&mut rng);

                println!("iteration {i}: insert({value:?})");

                assert_eq!(set.insert(value.clone()), Ok(reference.insert(value)));
            }
            Ops::DeleteSome => {
                let Some(value) = reference.iter().choose(&mut rng).cloned() else {
                    continue;
                };

                println!("iteration {i}: delete({value:?}) (existing)");

                assert_eq!(set.delete(&value), Ok(reference.remove(&value)));
            }
            Ops::DeleteNone => {
                let value = T::rand_gen(&mut rng);
                let expected = reference.remove(&value);
                let non = if expected { "" } else { "non-" };

                println!("iteration {i}: delete({value:?}) ({non}existing)");

                assert_eq!(set.delete(&value), Ok(expected));
            }
        }
    }
}

/// Runs random insert operations concurrently. Every value a thread inserts is visible to that
/// thread's next `contains` unless another thread deleted it, and nothing deletes here.
pub fn insert_concurrent<T: Clone + Debug + RandGen, S: Default + Sync + ConcurrentSet<T>>(
    threads: usize,
    steps: usize,
) {
    let set = S::default();

    scope(|s| {
        for _ in 0..threads {
            let _ = s.spawn(|| {
                let mut rng = thread_rng();
                for _ in 0..steps {
                    let value = T::rand_gen(&mut rng);
                    let _ = set.insert(value.clone()).unwrap();
                    assert_eq!(set.contains(&value), Ok(true), "{value:?} not visible");
                }
            });
        }
    });
}

enum Ops {
    Contains,
    Insert,
    Delete,
}
const OPS: [Ops; 3] = [Ops::Contains, Ops::Insert, Ops::Delete];

/// Operation and whether it returned `true`.
#[derive(Clone)]
enum Log<T> {
    Contains { value: T, result: bool },
    Insert { value: T, result: bool },
    Delete { value: T, result: bool },
}

impl<T> Log<T> {
    fn value(&self) -> &T {
        match self {
            Self::Contains { value, .. } | Self::Insert { value, .. } | Self::Delete { value, .. } => {
                value
            }
        }
    }
}

/// Randomly runs many operations concurrently.
pub fn stress_concurrent<T: Debug + RandGen, S: Default + Sync + ConcurrentSet<T>>(
    threads: usize,
    steps: usize,
) {
    let set = S::default();

    scope(|s| {
        for _ in 0..threads {
            let _ = s.spawn(|| {
                let mut rng = thread_rng();
                for _ in 0..steps {
                    let op = OPS.choose(&mut rng).unwrap();
                    let value = T::rand_gen(&mut rng);

                    match op {
                        Ops::Contains => {
                            let _ = set.contains(&value);
                        }
                        Ops::Insert => {
                            let _ = set.insert(value);
                        }
                        Ops::Delete => {
                            let _ = set.delete(&value);
                        }
                    }
                }
            });
        }
    });
}

/// Per value, successful inserts and deletes must alternate starting with an insert, so after
/// all threads finish the set holds the value iff it was inserted once more than deleted.
fn assert_logs_consistent<T: Debug + Eq + Hash, S: ConcurrentSet<T>>(set: &S, logs: &[Log<T>]) {
    let mut per_value = HashMap::new();
    for l in logs {
        let (inserts, deletes, seen) = per_value.entry(l.value()).or_insert((0usize, 0usize, false));
        match l {
            Log::Insert { result: true, .. } => *inserts += 1,
            Log::Delete { result: true, .. } => *deletes += 1,
            Log::Contains { result: true, .. } => *seen = true,
            _ => (),
        }
    }

    for (value, (inserts, deletes, seen)) in per_value {
        assert!(
            inserts == deletes || inserts == deletes + 1,
            "value: {value:?}, inserted {inserts} times but deleted {deletes} times."
        );
        assert!(
            !seen || inserts > 0,
            "value: {value:?}, contains succeeded but never inserted."
        );
        assert_eq!(
            set.contains(value),
            Ok(inserts > deletes),
            "value: {value:?}, final membership disagrees with the logs."
        );
    }
}

/// Randomly runs many operations concurrently and logs the operations & results per thread. Then
/// checks the consistency of the log. For example, if the value `v` was successfully deleted
/// twice, then `v` must have been successfully inserted two or three times.
pub fn log_concurrent<
    T: Clone + Debug + Eq + Hash + RandGen + Send,
    S: Default + Sync + ConcurrentSet<T>,
>(
    threads: usize,
    steps: usize,
) {
    let set = S::default();

    let logs = scope(|s| {
        let mut handles = Vec::new();

        for _ in 0..threads {
            let handle = s.spawn(|| {
                let mut rng = thread_rng();
                let mut logs = Vec::new();

                for _ in 0..steps {
                    let op = OPS.choose(&mut rng).unwrap();
                    let value = T::rand_gen(&mut rng);

                    match op {
                        Ops::Contains => {
                            let result = set.contains(&value).unwrap();
                            logs.push(Log::Contains { value, result });
                        }
                        Ops::Insert => {
                            let result = set.insert(value.clone()).unwrap();
                            logs.push(Log::Insert { value, result });
                        }
                        Ops::Delete => {
                            let result = set.delete(&value).unwrap();
                            logs.push(Log::Delete { value, result });
                        }
                    }
                }
                logs
            });
            handles.push(handle);
        }
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<Box<[_]>>()
    });

    assert_logs_consistent(&set, &logs);
}
