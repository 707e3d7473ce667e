use landmark_core::{Blendshape, LandmarkOutput};

/// Pose of the primary face, as the detector reported it.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PoseRepr {
    /// 4x4 facial transformation matrix, rows x/y/z/w.
    Matrix([[f32; 4]; 4]),
    /// Ordered 3D landmark points, when matrix output is disabled.
    Landmarks(Vec<[f32; 3]>),
}

/// One forwarded detection: non-empty pose, non-empty blendshapes, and the
/// submission timestamp of the frame that produced it.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TrackedPose {
    pub(crate) pose: PoseRepr,
    pub(crate) blendshapes: Vec<Blendshape>,
    pub(crate) timestamp_ms: i64,
}

impl TrackedPose {
    /// Primary-face view of a raw detector payload (index 0 of each set).
    ///
    /// Returns `None` when either the pose or the blendshape set is missing
    /// or empty ("no face this frame"); the detection is dropped, not forwarded.
    pub(crate) fn primary(mut output: LandmarkOutput, timestamp_ms: i64) -> Option<Self> {
        if output.blendshapes.is_empty() || output.blendshapes[0].is_empty() {
            return None;
        }

        let pose = if !output.transforms.is_empty() {
            PoseRepr::Matrix(output.transforms.swap_remove(0))
        } else if !output.landmarks.is_empty() && !output.landmarks[0].is_empty() {
            PoseRepr::Landmarks(output.landmarks.swap_remove(0))
        } else {
            return None;
        };

        Some(Self {
            pose,
            blendshapes: output.blendshapes.swap_remove(0),
            timestamp_ms,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn identity_matrix() -> [[f32; 4]; 4] {
        [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    pub(crate) fn jaw_open() -> Vec<Blendshape> {
        vec![Blendshape {
            name: "jawOpen".to_string(),
            score: 0.5,
        }]
    }

    pub(crate) fn full_output() -> LandmarkOutput {
        LandmarkOutput {
            landmarks: vec![vec![[0.1, 0.2, 0.3]]],
            blendshapes: vec![jaw_open()],
            transforms: vec![identity_matrix()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn empty_output_is_no_face() {
        assert!(TrackedPose::primary(LandmarkOutput::default(), 0).is_none());
    }

    #[test]
    fn empty_blendshapes_drop_the_result() {
        let output = LandmarkOutput {
            blendshapes: vec![],
            ..full_output()
        };
        assert!(TrackedPose::primary(output, 0).is_none());

        let output = LandmarkOutput {
            blendshapes: vec![vec![]],
            ..full_output()
        };
        assert!(TrackedPose::primary(output, 0).is_none());
    }

    #[test]
    fn empty_pose_drops_the_result() {
        let output = LandmarkOutput {
            landmarks: vec![],
            blendshapes: vec![jaw_open()],
            transforms: vec![],
        };
        assert!(TrackedPose::primary(output, 0).is_none());

        let output = LandmarkOutput {
            landmarks: vec![vec![]],
            blendshapes: vec![jaw_open()],
            transforms: vec![],
        };
        assert!(TrackedPose::primary(output, 0).is_none());
    }

    #[test]
    fn matrix_wins_over_landmarks() {
        let pose = TrackedPose::primary(full_output(), 7).unwrap();
        assert_eq!(pose.pose, PoseRepr::Matrix(identity_matrix()));
        assert_eq!(pose.blendshapes, jaw_open());
        assert_eq!(pose.timestamp_ms, 7);
    }

    #[test]
    fn landmarks_carry_the_pose_without_a_matrix() {
        let output = LandmarkOutput {
            transforms: vec![],
            ..full_output()
        };
        let pose = TrackedPose::primary(output, 0).unwrap();
        assert_eq!(pose.pose, PoseRepr::Landmarks(vec![[0.1, 0.2, 0.3]]));
    }
}
