//! Stats board: one tile per device, fed by telemetry snapshots.

use pistat_net::protocol::DeviceStats;
use pistat_types::entropy::Entropy;

use crate::animation::{Metric, TweenWindow};

/// Displayed telemetry for one device.
#[derive(Debug, Clone)]
pub struct StatTile {
    pub device_id: String,
    pub label: String,
    /// 1-based slot, assigned in first-seen order and never reused.
    pub index: usize,
    pub online: bool,
    pub active_task: Option<String>,
    pub cpu: Metric,
    pub ram: Metric,
}

impl StatTile {
    fn new(device_id: &str, index: usize) -> Self {
        Self {
            device_id: device_id.to_string(),
            label: device_id.to_string(),
            index,
            online: true,
            active_task: None,
            cpu: Metric::new("%", 0),
            ram: Metric::new("%", 0),
        }
    }

    /// Headline value shown on the tile.
    pub fn value(&self) -> String {
        if self.online {
            self.cpu.display()
        } else {
            "offline".to_string()
        }
    }

    /// Secondary line under the value.
    pub fn description(&self) -> String {
        if !self.online {
            return String::new();
        }
        match self.active_task.as_deref() {
            Some(task) if !task.is_empty() => format!("RAM {} | {task}", self.ram.display()),
            _ => format!("RAM {}", self.ram.display()),
        }
    }
}

/// All tiles, in slot order.
#[derive(Debug)]
pub struct StatsBoard {
    tiles: Vec<StatTile>,
    window: TweenWindow,
}

impl StatsBoard {
    pub fn new(window: TweenWindow) -> Self {
        Self {
            tiles: Vec::new(),
            window,
        }
    }

    /// Apply a snapshot: new devices get the next slot, every listed device
    /// is retargeted. Devices missing from the snapshot keep their values.
    pub fn apply_snapshot(&mut self, devices: &[DeviceStats], now_ms: u64, entropy: &mut Entropy) {
        for device in devices {
            let pos = match self.tiles.iter().position(|t| t.device_id == device.pi_id) {
                Some(pos) => pos,
                None => {
                    let index = self.tiles.len() + 1;
                    log::debug!("new stat tile #{index} for {}", device.pi_id);
                    self.tiles.push(StatTile::new(&device.pi_id, index));
                    self.tiles.len() - 1
                },
            };
            let window = self.window;
            let tile = &mut self.tiles[pos];
            if let Some(ref label) = device.label {
                tile.label = label.clone();
            }
            tile.online = device.online;
            tile.active_task = device.active_task.clone();
            tile.cpu.retarget(
                device.cpu_percent.unwrap_or(0.0),
                now_ms,
                window.pick(entropy),
            );
            tile.ram.retarget(
                device.ram_percent.unwrap_or(0.0),
                now_ms,
                window.pick(entropy),
            );
        }
    }

    /// Advance every metric. Returns `true` if anything is still moving.
    pub fn advance(&mut self, now_ms: u64) -> bool {
        let mut moving = false;
        for tile in &mut self.tiles {
            moving |= tile.cpu.advance(now_ms);
            moving |= tile.ram.advance(now_ms);
        }
        moving
    }

    pub fn tiles(&self) -> &[StatTile] {
        &self.tiles
    }

    pub fn by_index(&self, index: usize) -> Option<&StatTile> {
        self.tiles.iter().find(|t| t.index == index)
    }

    pub fn by_device(&self, device_id: &str) -> Option<&StatTile> {
        self.tiles.iter().find(|t| t.device_id == device_id)
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
