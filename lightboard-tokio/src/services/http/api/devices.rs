//! Device endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use lightboard_common::api::MessageResponse;
use lightboard_common::devices::{Device, DeviceId, DevicePatch};
use lightboard_common::lights::{HSBK, KELVIN_MAX, KELVIN_MIN};
use serde::Deserialize;

use super::super::errors::ResponseError;
use crate::lifx::discovery::DiscoveryHandle;
use crate::lifx::msg::Message;
use crate::lifx::transport::Transport;
use crate::registry::DeviceRegistry;

pub(crate) async fn list(
    State(registry): State<Arc<DeviceRegistry>>,
) -> Json<Vec<Device>> {
    Json(registry.list())
}

#[allow(clippy::unused_async)]
pub(crate) async fn discover(
    State(discovery): State<DiscoveryHandle>,
) -> Json<MessageResponse> {
    discovery.trigger();
    Json(MessageResponse::new("Discovery broadcast sent"))
}

pub(crate) async fn update(
    Path(id): Path<DeviceId>,
    State(registry): State<Arc<DeviceRegistry>>,
    Json(patch): Json<DevicePatch>,
) -> Result<Json<Device>, ResponseError> {
    let device = registry.mutate(id, &patch)?;
    Ok(Json(device))
}

pub(crate) async fn remove(
    Path(id): Path<DeviceId>,
    State(registry): State<Arc<DeviceRegistry>>,
) -> Result<Json<MessageResponse>, ResponseError> {
    registry.delete(id)?;
    Ok(Json(MessageResponse::new("Device removed")))
}

#[derive(Debug, Deserialize)]
pub(crate) struct PowerRequest {
    power: bool,
}

pub(crate) async fn set_power(
    Path(id): Path<DeviceId>,
    State(registry): State<Arc<DeviceRegistry>>,
    State(transport): State<Arc<Transport>>,
    Json(request): Json<PowerRequest>,
) -> Result<Json<Device>, ResponseError> {
    let device = registry
        .get(id)
        .ok_or_else(|| ResponseError::not_found("device"))?;

    send_to_device(
        &transport,
        &device,
        Message::SetLightPower {
            level: if request.power { 65535 } else { 0 },
            duration: 0,
        },
    )
    .await?;

    let updated = registry.set_state(id, Some(request.power), None)?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ColorRequest {
    hue: u16,
    saturation: u16,
    brightness: u16,
    kelvin: u16,
}

pub(crate) async fn set_color(
    Path(id): Path<DeviceId>,
    State(registry): State<Arc<DeviceRegistry>>,
    State(transport): State<Arc<Transport>>,
    Json(request): Json<ColorRequest>,
) -> Result<Json<Device>, ResponseError> {
    if request.kelvin != 0 && !(KELVIN_MIN..=KELVIN_MAX).contains(&request.kelvin) {
        return Err(ResponseError::Validation(vec![format!(
            "kelvin must be 0 or between {KELVIN_MIN} and {KELVIN_MAX}"
        )]));
    }

    let device = registry
        .get(id)
        .ok_or_else(|| ResponseError::not_found("device"))?;

    let color = HSBK {
        hue: request.hue,
        saturation: request.saturation,
        brightness: request.brightness,
        kelvin: request.kelvin,
    };

    send_to_device(
        &transport,
        &device,
        Message::SetColor {
            reserved: 0,
            color,
            duration: 0,
        },
    )
    .await?;

    let updated = registry.set_state(id, None, Some(color))?;
    Ok(Json(updated))
}

async fn send_to_device(
    transport: &Transport,
    device: &Device,
    message: Message,
) -> Result<(), ResponseError> {
    let ip = device
        .ip
        .ok_or_else(|| ResponseError::bad_request("device has no known address"))?;
    let addr = std::net::SocketAddr::new(ip, transport.device_port());
    transport.send_to(message, device.mac, addr).await?;
    Ok(())
}
