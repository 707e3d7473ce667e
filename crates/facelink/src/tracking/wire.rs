use landmark_core::Blendshape;
use serde::Serialize;

use crate::tracking::config::PayloadFormat;
use crate::tracking::data::{PoseRepr, TrackedPose};

/// Version byte leading every binary payload.
pub(crate) const WIRE_VERSION: u8 = 1;

const POSE_TAG_MATRIX: u8 = 0;
const POSE_TAG_LANDMARKS: u8 = 1;

/// Serialize one pose into a self-contained datagram payload.
///
/// Pure over [`TrackedPose`]: construction already guarantees a non-empty
/// pose and blendshape set, so there is no failure path here.
pub(crate) fn encode(format: PayloadFormat, pose: &TrackedPose) -> Vec<u8> {
    match format {
        PayloadFormat::Json => encode_json(pose),
        PayloadFormat::Binary => encode_binary(pose),
    }
}

/// JSON envelope: matrix rows flattened to top-level `x`/`y`/`z`/`w` keys
/// (or a `landmarks` key when matrix output is disabled), then the ordered
/// blendshape list. Blendshapes keep detector order; consumers index them
/// positionally.
#[derive(Serialize)]
struct WireData<'a> {
    #[serde(flatten)]
    pose: WirePose<'a>,
    blendshapes: &'a [Blendshape],
}

#[derive(Serialize)]
#[serde(untagged)]
enum WirePose<'a> {
    Matrix {
        x: &'a [f32; 4],
        y: &'a [f32; 4],
        z: &'a [f32; 4],
        w: &'a [f32; 4],
    },
    Landmarks {
        landmarks: &'a [[f32; 3]],
    },
}

fn encode_json(pose: &TrackedPose) -> Vec<u8> {
    let wire_pose = match &pose.pose {
        PoseRepr::Matrix(rows) => WirePose::Matrix {
            x: &rows[0],
            y: &rows[1],
            z: &rows[2],
            w: &rows[3],
        },
        PoseRepr::Landmarks(points) => WirePose::Landmarks { landmarks: points },
    };
    serde_json::to_vec(&WireData {
        pose: wire_pose,
        blendshapes: &pose.blendshapes,
    })
    .expect("wire data always serializes")
}

/// Compact native-endian layout for the companion transport:
/// version, pose tag, u16 blendshape count, pose payload (16 f32 matrix or
/// u32-counted landmark triples), then per blendshape a u8 name length, the
/// name bytes, and the f32 score.
fn encode_binary(pose: &TrackedPose) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + 64 + pose.blendshapes.len() * 24);
    buf.push(WIRE_VERSION);
    buf.push(match pose.pose {
        PoseRepr::Matrix(_) => POSE_TAG_MATRIX,
        PoseRepr::Landmarks(_) => POSE_TAG_LANDMARKS,
    });
    buf.extend_from_slice(&(pose.blendshapes.len() as u16).to_ne_bytes());

    match &pose.pose {
        PoseRepr::Matrix(rows) => {
            for row in rows {
                for value in row {
                    buf.extend_from_slice(&value.to_ne_bytes());
                }
            }
        }
        PoseRepr::Landmarks(points) => {
            buf.extend_from_slice(&(points.len() as u32).to_ne_bytes());
            for point in points {
                for value in point {
                    buf.extend_from_slice(&value.to_ne_bytes());
                }
            }
        }
    }

    for shape in &pose.blendshapes {
        let name = shape.name.as_bytes();
        let len = name.len().min(u8::MAX as usize);
        buf.push(len as u8);
        buf.extend_from_slice(&name[..len]);
        buf.extend_from_slice(&shape.score.to_ne_bytes());
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::data::fixtures;

    fn matrix_pose() -> TrackedPose {
        TrackedPose {
            pose: PoseRepr::Matrix(fixtures::identity_matrix()),
            blendshapes: fixtures::jaw_open(),
            timestamp_ms: 0,
        }
    }

    #[test]
    fn json_round_trips_matrix_and_blendshapes() {
        let payload = encode(PayloadFormat::Json, &matrix_pose());
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(value["x"], serde_json::json!([1.0, 0.0, 0.0, 0.0]));
        assert_eq!(value["y"], serde_json::json!([0.0, 1.0, 0.0, 0.0]));
        assert_eq!(value["z"], serde_json::json!([0.0, 0.0, 1.0, 0.0]));
        assert_eq!(value["w"], serde_json::json!([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(value["blendshapes"][0]["name"], "jawOpen");
        assert_eq!(value["blendshapes"][0]["score"], 0.5);
    }

    #[test]
    fn json_landmark_pose_uses_landmarks_key() {
        let pose = TrackedPose {
            pose: PoseRepr::Landmarks(vec![[0.1, 0.2, 0.3]]),
            blendshapes: fixtures::jaw_open(),
            timestamp_ms: 0,
        };
        let value: serde_json::Value =
            serde_json::from_slice(&encode(PayloadFormat::Json, &pose)).unwrap();

        assert!(value.get("x").is_none());
        assert_eq!(value["landmarks"][0].as_array().unwrap().len(), 3);
        assert_eq!(value["blendshapes"][0]["name"], "jawOpen");
    }

    #[test]
    fn json_preserves_detector_blendshape_order() {
        let pose = TrackedPose {
            blendshapes: vec![
                Blendshape {
                    name: "mouthSmileRight".to_string(),
                    score: 0.25,
                },
                Blendshape {
                    name: "eyeBlinkLeft".to_string(),
                    score: 0.9,
                },
            ],
            ..matrix_pose()
        };
        let value: serde_json::Value =
            serde_json::from_slice(&encode(PayloadFormat::Json, &pose)).unwrap();

        assert_eq!(value["blendshapes"][0]["name"], "mouthSmileRight");
        assert_eq!(value["blendshapes"][1]["name"], "eyeBlinkLeft");
    }

    #[test]
    fn binary_matrix_layout() {
        let payload = encode(PayloadFormat::Binary, &matrix_pose());

        assert_eq!(payload[0], WIRE_VERSION);
        assert_eq!(payload[1], POSE_TAG_MATRIX);
        assert_eq!(u16::from_ne_bytes([payload[2], payload[3]]), 1);

        // 16 matrix floats follow the 4-byte header.
        let floats: Vec<f32> = payload[4..4 + 64]
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[5], 1.0);
        assert_eq!(floats[10], 1.0);
        assert_eq!(floats[15], 1.0);
        assert_eq!(floats.iter().sum::<f32>(), 4.0);

        // One blendshape: name length, name, score.
        let mut at = 4 + 64;
        let name_len = payload[at] as usize;
        at += 1;
        assert_eq!(&payload[at..at + name_len], b"jawOpen");
        at += name_len;
        let score = f32::from_ne_bytes([
            payload[at],
            payload[at + 1],
            payload[at + 2],
            payload[at + 3],
        ]);
        assert_eq!(score, 0.5);
        assert_eq!(payload.len(), at + 4);
    }

    #[test]
    fn binary_landmark_layout() {
        let pose = TrackedPose {
            pose: PoseRepr::Landmarks(vec![[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]),
            blendshapes: fixtures::jaw_open(),
            timestamp_ms: 0,
        };
        let payload = encode(PayloadFormat::Binary, &pose);

        assert_eq!(payload[1], POSE_TAG_LANDMARKS);
        let count = u32::from_ne_bytes([payload[4], payload[5], payload[6], payload[7]]);
        assert_eq!(count, 2);
        let first = f32::from_ne_bytes([payload[8], payload[9], payload[10], payload[11]]);
        assert!((first - 0.1).abs() < 1e-6);
    }
}
