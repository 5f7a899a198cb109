use super::store::impl_data_block;

/// Whether an armature deforms its children with the current pose or with the bind configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PosePosition {
	#[default]
	Pose,
	Rest,
}

/// Skeleton data shared by armature objects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Armature {
	pub name: String,
	pub bones: Vec<String>,
	pub pose_position: PosePosition,
}

impl_data_block!(Armature);

impl Armature {
	pub fn new(name: impl Into<String>, bones: Vec<String>) -> Self {
		Self {
			name: name.into(),
			bones,
			pose_position: PosePosition::Pose,
		}
	}
}
