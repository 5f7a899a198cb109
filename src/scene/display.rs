use std::fmt;

use super::{CollectionId, ObjectKind, Scene};

impl fmt::Display for ObjectKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}",
			match self {
				ObjectKind::Empty => "empty",
				ObjectKind::Mesh => "mesh",
				ObjectKind::Armature => "armature",
			}
		)
	}
}

impl Scene {
	fn depth(&self, id: CollectionId) -> usize {
		let mut depth = 0;
		let mut current = id;
		while let Some(parent) = self.collections.parent(current) {
			depth += 1;
			current = parent;
		}
		depth
	}
}

/// Outline of the scene's collection tree with the objects linked into each collection.
impl fmt::Display for Scene {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for id in self.collections.subtree(self.collections.root()) {
			let Some(collection) = self.collections.get(id) else {
				continue;
			};
			let indent = "  ".repeat(self.depth(id));

			let name = &collection.name;
			#[cfg(feature = "owo")]
			let name = {
				use owo_colors::OwoColorize;
				name.bold()
			};
			if collection.exclude {
				let excluded = "(excluded)";
				#[cfg(feature = "owo")]
				let excluded = {
					use owo_colors::OwoColorize;
					excluded.dimmed()
				};
				writeln!(f, "{indent}{name} {excluded}")?;
			} else {
				writeln!(f, "{indent}{name}")?;
			}

			for &object_id in &collection.objects {
				let Some(object) = self.objects.get(object_id) else {
					continue;
				};
				let object_name = &object.name;
				#[cfg(feature = "owo")]
				let object_name = {
					use owo_colors::OwoColorize;
					object_name.green()
				};
				let hidden = if object.hide_viewport { " [hidden]" } else { "" };
				writeln!(f, "{indent}| {object_name} ({}){hidden}", object.kind())?;
			}
		}
		Ok(())
	}
}
