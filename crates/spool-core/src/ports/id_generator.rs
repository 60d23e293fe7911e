//! IdGenerator port - TaskId の発行
//!
//! results スナップショットは TaskId をキーにした BTreeMap なので、
//! 同じプロセスで発行した ID が発行順に並ぶようにしています。

use std::sync::Mutex;

use ulid::Ulid;

use crate::domain::TaskId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// Monotonic ULID generator.
///
/// The timestamp part comes from the clock. Within one millisecond (or when
/// the clock stands still or steps back) the previous id is incremented, so
/// ids from one generator are strictly increasing.
pub struct UlidGenerator<C> {
    clock: C,
    last: Mutex<Option<Ulid>>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last: Mutex::new(None),
        }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let next = match *last {
            Some(prev) if prev.timestamp_ms() >= timestamp_ms => prev
                .increment()
                .unwrap_or_else(|| Ulid::from_parts(prev.timestamp_ms() + 1, rand::random())),
            _ => Ulid::from_parts(timestamp_ms, rand::random()),
        };
        *last = Some(next);
        TaskId::from(next)
    }
}
