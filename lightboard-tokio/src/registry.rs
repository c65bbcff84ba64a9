//! The authoritative in-memory catalog of devices seen on the LAN.
//!
//! All access goes through one lock: writes are short single-map mutations,
//! readers get a stable snapshot. Every mutation emits a [`RegistryEvent`]
//! onto a pipe the push hub fans out to clients.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lightboard_common::devices::{Device, DeviceId, DevicePatch, MacAddress};
use lightboard_common::lights::HSBK;
use thiserror::Error;
use tracing::info;

use crate::pipes::stateless;

/// An error from a user-driven registry operation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RegistryError {
    /// The device id is not known.
    #[error("device not found")]
    NotFound,
}

/// A change to the registry, in observation order.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A device was seen for the first time.
    Discovered(Device),

    /// A known device changed.
    Updated(Device),
}

#[derive(Default)]
struct Inner {
    devices: HashMap<MacAddress, Device>,
    ids: HashMap<DeviceId, MacAddress>,
    next_id: DeviceId,
}

/// The catalog of known devices, keyed by hardware address.
pub struct DeviceRegistry {
    inner: RwLock<Inner>,
    tx: stateless::Sender<RegistryEvent>,
}

impl DeviceRegistry {
    /// Create an empty registry and the pipe its events go out on.
    #[must_use]
    pub fn new() -> (Self, stateless::Receiver<RegistryEvent>) {
        let (tx, rx) = stateless::create_pipe("registry");
        let registry = Self {
            inner: RwLock::new(Inner {
                devices: HashMap::new(),
                ids: HashMap::new(),
                next_id: 1,
            }),
            tx,
        };
        (registry, rx)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// All known devices, ordered by surrogate id.
    #[must_use]
    pub fn list(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.read().devices.values().cloned().collect();
        devices.sort_by_key(|d| d.id);
        devices
    }

    /// Look up a device by surrogate id.
    #[must_use]
    pub fn get(&self, id: DeviceId) -> Option<Device> {
        let inner = self.read();
        let mac = inner.ids.get(&id)?;
        inner.devices.get(mac).cloned()
    }

    /// Look up a device by hardware address.
    #[must_use]
    pub fn get_by_mac(&self, mac: MacAddress) -> Option<Device> {
        self.read().devices.get(&mac).cloned()
    }

    /// Record a label reply. Creates the device on first sight; a device
    /// only enters the registry once its label is known.
    pub fn observe_label(&self, mac: MacAddress, ip: IpAddr, label: &str) {
        let now = Utc::now();
        let event = {
            let mut inner = self.write();

            if let Some(device) = inner.devices.get_mut(&mac) {
                device.label = label.to_string();
                device.ip = Some(ip);
                device.is_online = true;
                device.last_seen = device.last_seen.max(now);
                RegistryEvent::Updated(device.clone())
            } else {
                let id = inner.next_id;
                inner.next_id += 1;

                let mut device = Device {
                    id,
                    mac,
                    label: label.to_string(),
                    ip: Some(ip),
                    device_type: "light".to_string(),
                    is_online: true,
                    last_seen: now,
                    is_adopted: false,
                    power: false,
                    color: HSBK::white(100, 3500),
                    brightness: 0,
                    temperature: 0,
                };
                device.refresh_derived();

                info!("discovered device {mac} ({label}) as id {id}");
                inner.ids.insert(id, mac);
                inner.devices.insert(mac, device.clone());
                RegistryEvent::Discovered(device)
            }
        };
        self.tx.try_send(event);
    }

    /// Merge a state reply into a known device. Replies from devices that
    /// have not introduced themselves with a label yet are dropped.
    pub fn observe_state(
        &self,
        mac: MacAddress,
        ip: IpAddr,
        power: Option<bool>,
        color: Option<HSBK>,
    ) {
        let now = Utc::now();
        let event = {
            let mut inner = self.write();
            let Some(device) = inner.devices.get_mut(&mac) else {
                return;
            };

            if let Some(power) = power {
                device.power = power;
            }
            if let Some(color) = color {
                device.color = color;
            }
            device.ip = Some(ip);
            device.is_online = true;
            device.last_seen = device.last_seen.max(now);
            device.refresh_derived();
            RegistryEvent::Updated(device.clone())
        };
        self.tx.try_send(event);
    }

    /// Apply a user patch (rename, adopt).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown id.
    pub fn mutate(&self, id: DeviceId, patch: &DevicePatch) -> Result<Device, RegistryError> {
        let event = {
            let mut inner = self.write();
            let mac = *inner.ids.get(&id).ok_or(RegistryError::NotFound)?;
            let device = inner.devices.get_mut(&mac).ok_or(RegistryError::NotFound)?;

            if let Some(label) = &patch.label {
                device.label = label.clone();
            }
            if let Some(is_adopted) = patch.is_adopted {
                device.is_adopted = is_adopted;
            }
            RegistryEvent::Updated(device.clone())
        };

        let device = match &event {
            RegistryEvent::Updated(d) | RegistryEvent::Discovered(d) => d.clone(),
        };
        self.tx.try_send(event);
        Ok(device)
    }

    /// Record the state a user command drove the device to. The next poll
    /// or State reply confirms it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown id.
    pub fn set_state(
        &self,
        id: DeviceId,
        power: Option<bool>,
        color: Option<HSBK>,
    ) -> Result<Device, RegistryError> {
        let device = {
            let mut inner = self.write();
            let mac = *inner.ids.get(&id).ok_or(RegistryError::NotFound)?;
            let device = inner.devices.get_mut(&mac).ok_or(RegistryError::NotFound)?;

            if let Some(power) = power {
                device.power = power;
            }
            if let Some(color) = color {
                device.color = color;
            }
            device.refresh_derived();
            device.clone()
        };
        self.tx.try_send(RegistryEvent::Updated(device.clone()));
        Ok(device)
    }

    /// Forget a device. Only the user does this.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown id.
    pub fn delete(&self, id: DeviceId) -> Result<(), RegistryError> {
        let mut inner = self.write();
        let mac = inner.ids.remove(&id).ok_or(RegistryError::NotFound)?;
        inner.devices.remove(&mac);
        Ok(())
    }

    /// Mark devices that have not replied within the grace period offline.
    /// Invoked by the liveness sweeper.
    pub fn sweep(&self, grace: Duration) {
        self.sweep_at(Utc::now(), grace);
    }

    /// [`sweep`](Self::sweep) against an explicit clock.
    pub fn sweep_at(&self, now: DateTime<Utc>, grace: Duration) {
        let grace = chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::seconds(60));
        let events: Vec<RegistryEvent> = {
            let mut inner = self.write();
            inner
                .devices
                .values_mut()
                .filter(|device| device.is_online && device.last_seen + grace < now)
                .map(|device| {
                    device.is_online = false;
                    info!("device {} ({}) went offline", device.mac, device.label);
                    RegistryEvent::Updated(device.clone())
                })
                .collect()
        };
        for event in events {
            self.tx.try_send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn mac(n: u8) -> MacAddress {
        MacAddress::new([0xd0, 0x73, 0xd5, 0x00, 0xaa, n])
    }

    fn ip() -> IpAddr {
        "192.168.1.34".parse().unwrap()
    }

    #[tokio::test]
    async fn test_observe_label_creates_once() {
        let (registry, rx) = DeviceRegistry::new();
        let mut sub = rx.subscribe();

        registry.observe_label(mac(1), ip(), "Kitchen");
        registry.observe_label(mac(1), ip(), "Kitchen Renamed");

        let devices = registry.list();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, 1);
        assert_eq!(devices[0].label, "Kitchen Renamed");
        assert!(devices[0].is_online);

        assert!(matches!(
            sub.recv().await.unwrap(),
            RegistryEvent::Discovered(_)
        ));
        assert!(matches!(
            sub.recv().await.unwrap(),
            RegistryEvent::Updated(_)
        ));
    }

    #[test]
    fn test_surrogate_ids_are_sequential() {
        let (registry, _rx) = DeviceRegistry::new();
        registry.observe_label(mac(1), ip(), "A");
        registry.observe_label(mac(2), ip(), "B");

        assert_eq!(registry.get(1).unwrap().mac, mac(1));
        assert_eq!(registry.get(2).unwrap().mac, mac(2));
    }

    #[test]
    fn test_observe_state_needs_prior_label() {
        let (registry, _rx) = DeviceRegistry::new();
        registry.observe_state(mac(1), ip(), Some(true), None);
        assert!(registry.list().is_empty());

        registry.observe_label(mac(1), ip(), "Kitchen");
        let color = HSBK::white(50, 3500);
        registry.observe_state(mac(1), ip(), Some(true), Some(color));

        let device = registry.get_by_mac(mac(1)).unwrap();
        assert!(device.power);
        assert_eq!(device.color, color);
        assert_eq!(device.brightness, 50);
        assert_eq!(device.temperature, 3500);
    }

    #[test]
    fn test_mutate_unknown_id() {
        let (registry, _rx) = DeviceRegistry::new();
        let patch = DevicePatch {
            label: None,
            is_adopted: Some(true),
        };
        assert_eq!(registry.mutate(9, &patch), Err(RegistryError::NotFound));
    }

    #[test]
    fn test_adopt_and_delete() {
        let (registry, _rx) = DeviceRegistry::new();
        registry.observe_label(mac(1), ip(), "Kitchen");

        let patch = DevicePatch {
            label: None,
            is_adopted: Some(true),
        };
        let device = registry.mutate(1, &patch).unwrap();
        assert!(device.is_adopted);

        registry.delete(1).unwrap();
        assert!(registry.get(1).is_none());
        assert_eq!(registry.delete(1), Err(RegistryError::NotFound));
    }

    #[tokio::test]
    async fn test_sweep_marks_stale_devices_offline() {
        let (registry, rx) = DeviceRegistry::new();
        registry.observe_label(mac(1), ip(), "Kitchen");
        let mut sub = rx.subscribe();

        // Within the grace period: still online.
        registry.sweep_at(Utc::now() + chrono::Duration::seconds(30), Duration::from_secs(60));
        assert!(registry.get(1).unwrap().is_online);

        // Past the grace period: marked offline, exactly one event.
        registry.sweep_at(Utc::now() + chrono::Duration::seconds(61), Duration::from_secs(60));
        let device = registry.get(1).unwrap();
        assert!(!device.is_online);

        let event = sub.recv().await.unwrap();
        match event {
            RegistryEvent::Updated(d) => assert!(!d.is_online),
            RegistryEvent::Discovered(_) => panic!("expected update"),
        }

        // Sweeping again emits nothing; the device is already offline.
        registry.sweep_at(Utc::now() + chrono::Duration::seconds(120), Duration::from_secs(60));
        assert!(sub.try_recv().unwrap().is_none());
    }
}
