//! Data-block naming conventions.

/// Strips a trailing host disambiguation suffix (`.001`, `.012`, ...) from a name.
///
/// Only an all-digit suffix after the last dot counts, so `Skin 2.001` becomes `Skin 2`
/// while `Hair.Long` stays as is.
pub fn base_name(name: &str) -> &str {
	match name.rsplit_once('.') {
		Some((base, suffix)) if !base.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) => {
			base
		}
		_ => name,
	}
}

/// `{prefix}_{base}` where `base` is the stripped base name of `name`.
pub fn prefixed(prefix: &str, name: &str) -> String {
	format!("{prefix}_{}", base_name(name))
}

/// Name given to a duplicate when `name` is taken: `{base}.{n:03}`.
pub(crate) fn numbered(name: &str, n: usize) -> String {
	format!("{}.{n:03}", base_name(name))
}

/// Whether the stripped base name ends with any of the given suffixes.
pub fn has_excluded_suffix<S: AsRef<str>>(name: &str, suffixes: &[S]) -> bool {
	let base = base_name(name);
	suffixes.iter().any(|suffix| base.ends_with(suffix.as_ref()))
}
