use serde::{Deserialize, Deserializer};
use snapshot::SerializeOptions;
use std::time::Duration;

fn optional_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
}

/// Recorder settings. Serialization settings sit at the same level, so a
/// config file names `block_class` next to `checkout_every_nth`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RecordOptions {
    #[serde(flatten)]
    pub serialize: SerializeOptions,
    /// Take a fresh full snapshot after this many incremental events.
    pub checkout_every_nth: Option<usize>,
    /// Take a fresh full snapshot once this much time passed since the last.
    #[serde(deserialize_with = "optional_millis")]
    pub checkout_every_nms: Option<Duration>,
    /// Location reported in `Meta` events.
    pub href: String,
    pub width: u32,
    pub height: u32,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            serialize: SerializeOptions::default(),
            checkout_every_nth: None,
            checkout_every_nms: None,
            href: "about:blank".into(),
            width: 1280,
            height: 720,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_flat_toml() {
        let options: RecordOptions = toml::from_str(
            r#"
            href = "https://example.com/"
            checkout_every_nth = 200
            checkout_every_nms = 300000
            block_class = "private"
            mask_all_inputs = true
            "#,
        )
        .unwrap();
        assert_eq!(options.checkout_every_nth, Some(200));
        assert_eq!(options.checkout_every_nms, Some(Duration::from_secs(300)));
        assert!(options.serialize.mask_all_inputs);
        assert!(options.serialize.block_class.matches_class("private"));
        assert_eq!(options.width, 1280);
    }
}
