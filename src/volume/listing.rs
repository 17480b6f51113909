//! Volume Listing Parser
//!
//! Turns the free-text output of `gluster volume info` into [`Volume`]s.
//! Each observation is a fresh full parse; nothing is patched in place.

use crate::domain::ports::Volume;
use indexmap::IndexMap;

/// Volumes keyed by name, in listing order
pub type VolumeListing = IndexMap<String, Volume>;

const KEY_VOLUME_NAME: &str = "Volume Name";
const KEY_VOLUME_ID: &str = "Volume ID";
const KEY_STATUS: &str = "Status";
const KEY_BRICK_PREFIX: &str = "Brick";
const STATUS_STARTED: &str = "Started";

/// Parse a volume listing
///
/// Lines are `Key: value`, split at the first colon. Lines without a colon
/// and keys seen before the first `Volume Name` are ignored.
pub fn parse_volume_info(output: &str) -> VolumeListing {
    let mut volumes = VolumeListing::new();
    let mut current: Option<String> = None;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if key == KEY_VOLUME_NAME {
            volumes.insert(value.to_string(), Volume::named(value));
            current = Some(value.to_string());
            continue;
        }

        let Some(volume) = current.as_ref().and_then(|name| volumes.get_mut(name)) else {
            continue;
        };

        if key == KEY_VOLUME_ID {
            volume.id = value.to_string();
        } else if key == KEY_STATUS {
            volume.running = value == STATUS_STARTED;
        } else if key.starts_with(KEY_BRICK_PREFIX) && !value.is_empty() {
            volume.bricks.push(value.to_string());
        }
    }

    volumes
}
