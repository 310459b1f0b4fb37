use serde::{Deserialize, Serialize};

/// Message timestamp. Accepts both the ROS 2 (`sec`/`nanosec`) and ROS 1
/// (`secs`/`nsecs`) field names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    #[serde(default, alias = "secs")]
    pub sec: i32,
    #[serde(default, alias = "nsecs")]
    pub nanosec: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub stamp: Stamp,
    #[serde(default)]
    pub frame_id: String,
}

/// Transport-native raw image, laid out like `sensor_msgs/Image` with the
/// pixel payload base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMessage {
    #[serde(default)]
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub encoding: String,
    #[serde(default)]
    pub is_bigendian: u8,
    /// Row length in bytes, including any padding.
    pub step: u32,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ImageMessage {
    /// Build a message whose rows are tightly packed.
    pub fn packed(width: u32, height: u32, encoding: &str, data: Vec<u8>) -> Self {
        let step = if height == 0 {
            0
        } else {
            (data.len() / height as usize) as u32
        };
        Self {
            header: Header::default(),
            height,
            width,
            encoding: encoding.to_string(),
            is_bigendian: 0,
            step,
            data,
        }
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.header = header;
        self
    }

    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// One raw payload received from a subscription, numbered in arrival order.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub sequence: u64,
    pub topic: String,
    pub payload: Vec<u8>,
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_derives_step_from_rows() {
        let msg = ImageMessage::packed(4, 2, "rgb8", vec![0; 24]);
        assert_eq!(msg.step, 12);
        assert_eq!(msg.header, Header::default());
    }

    #[test]
    fn packed_zero_height_has_zero_step() {
        let msg = ImageMessage::packed(4, 0, "rgb8", vec![]);
        assert_eq!(msg.step, 0);
    }

    #[test]
    fn data_is_base64_on_the_wire() {
        let msg = ImageMessage::packed(1, 1, "rgb8", vec![1, 2, 3]);
        let json: serde_json::Value = serde_json::from_slice(&msg.to_vec().unwrap()).unwrap();
        assert_eq!(json["data"], "AQID");
        assert_eq!(json["encoding"], "rgb8");
    }
}
