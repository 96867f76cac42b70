//! Output device lookup

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, HostId};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Whether a configured host label ("ALSA", "CoreAudio", ...) names `host_id`
fn host_matches(host_id: HostId, label: &str) -> bool {
    host_id.name().eq_ignore_ascii_case(label)
}

fn find_on_host(host: &Host, name: &str) -> Option<Device> {
    host.output_devices()
        .ok()?
        .find(|device| device.name().is_ok_and(|n| n == name))
}

/// Open the output device named by `id`, or the system default
///
/// A device pinned to a host is only looked for there. Otherwise the
/// default host is tried first, then every other available host.
pub fn open_output_device(id: Option<&DeviceId>) -> AudioResult<Device> {
    let Some(id) = id else {
        return cpal::default_host()
            .default_output_device()
            .ok_or(AudioError::NoDefaultDevice);
    };

    let default_host = cpal::default_host();
    if id.host.is_none() {
        if let Some(device) = find_on_host(&default_host, &id.name) {
            return Ok(device);
        }
    }

    cpal::available_hosts()
        .into_iter()
        .filter(|&host_id| match id.host.as_deref() {
            Some(label) => host_matches(host_id, label),
            None => host_id != default_host.id(),
        })
        .filter_map(|host_id| cpal::host_from_id(host_id).ok())
        .find_map(|host| find_on_host(&host, &id.name))
        .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()))
}
