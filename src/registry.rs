// ABOUTME: In-memory registry mapping tenant fingerprints to container records.
// ABOUTME: Source of truth within a process; rebuilt by adoption after restart.

use crate::types::TenantFingerprint;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

/// Lifecycle status of a tenant container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Starting,
    Running,
    Stopped,
    Failed,
}

/// Everything the gateway tracks about one tenant's container.
#[derive(Debug, Clone)]
pub struct ContainerRecord {
    pub name: String,
    pub fingerprint: TenantFingerprint,
    pub host_port: u16,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub status: ContainerStatus,
}

impl ContainerRecord {
    /// A fresh record for a container provisioned or adopted at `now`.
    pub fn new(fingerprint: TenantFingerprint, host_port: u16, now: DateTime<Utc>) -> Self {
        Self {
            name: fingerprint.container_name(),
            fingerprint,
            host_port,
            created_at: now,
            last_used_at: now,
            status: ContainerStatus::Running,
        }
    }

    pub fn idle_since(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_used_at
    }
}

/// Thread-safe fingerprint → record map.
///
/// The registry never calls into the runtime adapter; reconciling records
/// with actual container state is the lifecycle controller's job.
#[derive(Default)]
pub struct Registry {
    records: RwLock<HashMap<TenantFingerprint, ContainerRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &TenantFingerprint) -> Option<ContainerRecord> {
        self.records.read().get(fingerprint).cloned()
    }

    pub fn put(&self, record: ContainerRecord) {
        self.records
            .write()
            .insert(record.fingerprint.clone(), record);
    }

    pub fn delete(&self, fingerprint: &TenantFingerprint) -> Option<ContainerRecord> {
        self.records.write().remove(fingerprint)
    }

    /// Advance a record's last-used timestamp. Within one incarnation the
    /// timestamp only moves forward.
    pub fn touch(&self, fingerprint: &TenantFingerprint, now: DateTime<Utc>) {
        if let Some(record) = self.records.write().get_mut(fingerprint) {
            record.last_used_at = record.last_used_at.max(now);
        }
    }

    /// Atomic read-modify-write of a single record. Returns false when no
    /// record exists for the fingerprint.
    pub fn update<F>(&self, fingerprint: &TenantFingerprint, f: F) -> bool
    where
        F: FnOnce(&mut ContainerRecord),
    {
        match self.records.write().get_mut(fingerprint) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }

    /// A coherent point-in-time copy of all records.
    pub fn snapshot(&self) -> Vec<ContainerRecord> {
        self.records.read().values().cloned().collect()
    }

    pub fn tracked(&self) -> usize {
        self.records.read().len()
    }

    pub fn running(&self) -> usize {
        self.records
            .read()
            .values()
            .filter(|r| r.status == ContainerStatus::Running)
            .count()
    }
}
