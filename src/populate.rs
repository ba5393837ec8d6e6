// Batch creation of generated users and VMs through the API. Individual
// failures are logged and skipped; the batch keeps going.

use std::thread;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{error, info};

use crate::api::ApiClient;
use crate::generator::{UserDataGenerator, VmDataGenerator};
use crate::models::{User, VirtualMachine};

/// Password given to every generated account.
pub const DEFAULT_PASSWORD: &str = "password123";

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// Pause between batches; half of it is also taken between items.
    pub delay: Duration,
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            delay: Duration::from_millis(500),
            show_progress: true,
        }
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateStats {
    pub requested: usize,
    pub created: usize,
    pub failed: usize,
}

fn progress_bar(len: usize, show: bool, label: &str) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len} ({elapsed})") {
        pb.set_style(style);
    }
    pb.set_message(label.to_string());
    pb
}

/// Run `create` for `count` items in batches, pausing between items and
/// batches. Returns the successes and the stats.
fn run_batches<T, F>(count: usize, opts: &BatchOptions, label: &str, mut create: F) -> (Vec<T>, PopulateStats)
where
    F: FnMut(usize) -> crate::error::Result<T>,
{
    let batch_size = opts.batch_size.max(1);
    let pb = progress_bar(count, opts.show_progress, label);
    let mut created = Vec::with_capacity(count);
    let mut stats = PopulateStats {
        requested: count,
        ..Default::default()
    };

    for batch_start in (0..count).step_by(batch_size) {
        let batch_end = (batch_start + batch_size).min(count);
        info!(batch = batch_start / batch_size + 1, from = batch_start + 1, to = batch_end, total = count, "{label}");

        for index in batch_start..batch_end {
            match create(index) {
                Ok(item) => {
                    created.push(item);
                    stats.created += 1;
                }
                Err(e) => {
                    error!(index, error = %e, "{label}: item failed");
                    stats.failed += 1;
                }
            }
            pb.inc(1);
            if index + 1 < batch_end {
                thread::sleep(opts.delay / 2);
            }
        }
        if batch_end < count {
            thread::sleep(opts.delay);
        }
    }

    pb.finish_and_clear();
    (created, stats)
}

/// Create `count` generated users.
pub fn create_users<R: Rng>(
    api: &ApiClient,
    generator: &mut UserDataGenerator<R>,
    count: usize,
    opts: &BatchOptions,
) -> (Vec<User>, PopulateStats) {
    let (users, stats) = run_batches(count, opts, "creating users", |index| {
        let draft = generator.generate_user(index as i64 + 1);
        api.create_user(&draft.name, &draft.email, Some(DEFAULT_PASSWORD))
    });
    info!(created = stats.created, failed = stats.failed, "users created");
    (users, stats)
}

/// Create `count` generated VMs, each owned by a random id from `user_ids`.
pub fn create_vms<R: Rng>(
    api: &ApiClient,
    generator: &mut VmDataGenerator<R>,
    rng: &mut impl Rng,
    count: usize,
    user_ids: &[i64],
    opts: &BatchOptions,
) -> (Vec<VirtualMachine>, PopulateStats) {
    if user_ids.is_empty() {
        error!("no users available to own VMs");
        return (
            Vec::new(),
            PopulateStats {
                requested: count,
                created: 0,
                failed: count,
            },
        );
    }
    let (vms, stats) = run_batches(count, opts, "creating VMs", |_| {
        let owner = user_ids.choose(&mut *rng).copied().unwrap_or(user_ids[0]);
        api.create_vm(&generator.generate_new_vm(owner))
    });
    info!(created = stats.created, failed = stats.failed, "VMs created");
    (vms, stats)
}
