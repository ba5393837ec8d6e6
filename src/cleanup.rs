// Bulk deletion of every VM and then every user. Without `confirm` nothing is
// deleted: items are only listed, which doubles as a preview.

use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::api::ApiClient;
use crate::error::Result;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub id: i64,
    pub name: String,
    /// Owner id for VMs, email for users.
    pub detail: String,
    pub status: Option<String>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub total: usize,
    pub deleted: usize,
    pub failed: usize,
    pub items: Vec<ItemInfo>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct CleanupSummary {
    pub vms: CleanupStats,
    pub users: CleanupStats,
    pub total_items: usize,
    pub deleted_items: usize,
    pub failed_items: usize,
    pub success_rate: f64,
}

pub struct DataCleanup<'a> {
    api: &'a ApiClient,
    pause: Duration,
}

impl<'a> DataCleanup<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self {
            api,
            pause: Duration::from_millis(100),
        }
    }

    /// Pause taken after each successful deletion.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    fn sweep<T, D>(&self, items: Vec<(ItemInfo, T)>, confirm: bool, mut delete: D) -> CleanupStats
    where
        D: FnMut(&T) -> Result<()>,
    {
        let mut stats = CleanupStats {
            total: items.len(),
            ..Default::default()
        };
        for (info, key) in items {
            info!(id = info.id, name = %info.name, detail = %info.detail, "found");
            if confirm {
                match delete(&key) {
                    Ok(()) => {
                        stats.deleted += 1;
                        thread::sleep(self.pause);
                    }
                    Err(e) => {
                        error!(id = info.id, error = %e, "deletion failed");
                        stats.failed += 1;
                    }
                }
            }
            stats.items.push(info);
        }
        stats
    }

    pub fn cleanup_all_vms(&self, confirm: bool) -> Result<CleanupStats> {
        info!(confirm, "scanning VMs");
        let items = self
            .api
            .get_vms()?
            .into_iter()
            .map(|vm| {
                let info = ItemInfo {
                    id: vm.id,
                    name: vm.name,
                    detail: format!("user {}", vm.user_id),
                    status: Some(vm.status.to_string()),
                };
                (info, vm.id)
            })
            .collect();
        Ok(self.sweep(items, confirm, |id| self.api.delete_vm(*id)))
    }

    pub fn cleanup_all_users(&self, confirm: bool) -> Result<CleanupStats> {
        info!(confirm, "scanning users");
        let items = self
            .api
            .get_users()?
            .into_iter()
            .map(|user| {
                let info = ItemInfo {
                    id: user.id,
                    name: user.name,
                    detail: user.email,
                    status: None,
                };
                (info, user.id)
            })
            .collect();
        Ok(self.sweep(items, confirm, |id| self.api.delete_user(*id)))
    }

    /// VMs first so no VM is left pointing at a deleted user.
    pub fn cleanup_everything(&self, confirm: bool) -> Result<CleanupSummary> {
        let vms = self.cleanup_all_vms(confirm)?;
        if confirm {
            thread::sleep(self.pause * 10);
        }
        let users = self.cleanup_all_users(confirm)?;

        let total_items = vms.total + users.total;
        let deleted_items = vms.deleted + users.deleted;
        let failed_items = vms.failed + users.failed;
        let success_rate = if total_items > 0 {
            deleted_items as f64 * 100.0 / total_items as f64
        } else {
            0.0
        };
        info!(total_items, deleted_items, failed_items, success_rate, "cleanup finished");
        Ok(CleanupSummary {
            vms,
            users,
            total_items,
            deleted_items,
            failed_items,
            success_rate,
        })
    }
}
