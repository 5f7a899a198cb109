use std::fmt;

use glam::{Vec3, Vec4};

/// Value held by a node or modifier input socket.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketValue {
	Int(i32),
	Float(f32),
	Bool(bool),
	/// Menu socket, holding the selected item's name.
	Menu(String),
	Color(Vec4),
	Vector(Vec3),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
	Int,
	Float,
	Bool,
	Menu,
	Color,
	Vector,
}

impl SocketValue {
	pub fn kind(&self) -> ValueKind {
		match self {
			SocketValue::Int(_) => ValueKind::Int,
			SocketValue::Float(_) => ValueKind::Float,
			SocketValue::Bool(_) => ValueKind::Bool,
			SocketValue::Menu(_) => ValueKind::Menu,
			SocketValue::Color(_) => ValueKind::Color,
			SocketValue::Vector(_) => ValueKind::Vector,
		}
	}
}

impl fmt::Display for ValueKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ValueKind::Int => "int",
			ValueKind::Float => "float",
			ValueKind::Bool => "bool",
			ValueKind::Menu => "menu",
			ValueKind::Color => "color",
			ValueKind::Vector => "vector",
		})
	}
}

impl fmt::Display for SocketValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SocketValue::Int(v) => write!(f, "{v}"),
			SocketValue::Float(v) => write!(f, "{v:.3}"),
			SocketValue::Bool(v) => write!(f, "{v}"),
			SocketValue::Menu(v) => write!(f, "{v:?}"),
			SocketValue::Color(c) => write!(f, "rgba({:.3}, {:.3}, {:.3}, {:.3})", c.x, c.y, c.z, c.w),
			SocketValue::Vector(v) => write!(f, "({:.3}, {:.3}, {:.3})", v.x, v.y, v.z),
		}
	}
}
