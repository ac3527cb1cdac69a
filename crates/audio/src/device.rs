use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDevice {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

pub fn list_output_devices() -> crate::Result<Vec<OutputDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for device in host.output_devices()? {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let is_default = default_name.as_ref() == Some(&name);
        devices.push(OutputDevice {
            id: name.clone(),
            name,
            is_default,
        });
    }

    Ok(devices)
}

pub fn default_output_device() -> crate::Result<Option<OutputDevice>> {
    let host = cpal::default_host();
    Ok(host.default_output_device().map(|device| {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        OutputDevice {
            id: name.clone(),
            name,
            is_default: true,
        }
    }))
}

pub fn find_output_device(id: &str) -> crate::Result<Option<OutputDevice>> {
    let devices = list_output_devices()?;
    Ok(devices.into_iter().find(|d| d.id == id))
}

/// Open a cpal output device by id, or the host default.
pub(crate) fn resolve_output_device(
    host: &cpal::Host,
    device_id: Option<&str>,
) -> crate::Result<cpal::Device> {
    match device_id {
        Some(id) => host
            .output_devices()?
            .find(|d| d.name().ok().as_deref() == Some(id))
            .ok_or_else(|| crate::AudioError::DeviceNotFound(id.to_string())),
        None => host
            .default_output_device()
            .ok_or_else(|| crate::AudioError::DeviceNotFound("default".to_string())),
    }
}
