//! Read-only reference tables refreshed by controller broadcasts.

use std::collections::BTreeMap;

use crate::protocol::{DeviceStats, TaskEntry};

/// Task and device label lookup.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Tasks in broadcast order.
    tasks: Vec<TaskEntry>,
    device_labels: BTreeMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the task table with a fresh broadcast.
    pub fn replace_tasks(&mut self, tasks: Vec<TaskEntry>) {
        log::debug!("task catalog refreshed: {} entries", tasks.len());
        self.tasks = tasks;
    }

    pub fn tasks(&self) -> &[TaskEntry] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&TaskEntry> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Human label for a known task id.
    pub fn task_label(&self, id: &str) -> Option<&str> {
        self.task(id).map(|t| t.label.as_deref().unwrap_or(&t.id))
    }

    pub fn set_device_label(&mut self, device_id: &str, label: &str) {
        self.device_labels
            .insert(device_id.to_string(), label.to_string());
    }

    /// Record labels from a stats snapshot. Devices without a label are
    /// still registered under their id.
    pub fn absorb_snapshot(&mut self, devices: &[DeviceStats]) {
        for device in devices {
            let label = device.label.as_deref().unwrap_or(&device.pi_id);
            self.set_device_label(&device.pi_id, label);
        }
    }

    /// Display label for a device, falling back to its id.
    pub fn device_label<'a>(&'a self, device_id: &'a str) -> &'a str {
        self.device_labels
            .get(device_id)
            .map(String::as_str)
            .unwrap_or(device_id)
    }

    /// Known device ids, sorted.
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.device_labels.keys().map(String::as_str)
    }

    /// Find a device by id or (case-insensitive) label.
    pub fn find_device(&self, reference: &str) -> Option<&str> {
        if let Some((id, _)) = self.device_labels.get_key_value(reference) {
            return Some(id);
        }
        self.device_labels
            .iter()
            .find(|(_, label)| label.eq_ignore_ascii_case(reference))
            .map(|(id, _)| id.as_str())
    }
}
