// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Namespace prefixes and package path transformations.
//!
//! Package paths are `/`-separated (`Scenes/Interiors/Showcase`). Object paths
//! add the object name after a dot in the leaf (`Scenes/Showcase.Showcase`).
//! An instance namespace is expressed as a prefix on the *leaf* only
//! (`Scenes/INST_7_Showcase`), so templates stored in nested directories are
//! handled the same way as top-level ones.
//!
//! Everything here is pure string manipulation.

use crate::ident::InstanceId;

/// Marker that starts every instance prefix.
pub const INSTANCE_PREFIX: &str = "INST";

/// Builds the namespace prefix for `id`: `INST_<id>_`.
#[must_use]
pub fn build_prefix(id: InstanceId) -> String {
    format!("{INSTANCE_PREFIX}_{}_", id.get())
}

/// Returns the leaf component of `path` (everything after the last `/`).
#[must_use]
pub fn leaf_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, leaf)| leaf)
}

/// Returns the directory part of `path` (everything before the last `/`), or
/// `""` for a bare leaf.
#[must_use]
pub fn package_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Maps an object path (`Dir/Pkg.Object`) to its package (`Dir/Pkg`).
///
/// Package paths pass through unchanged.
#[must_use]
pub fn package_of(object_path: &str) -> &str {
    let dir_len = object_path.len() - leaf_name(object_path).len();
    match object_path[dir_len..].find('.') {
        Some(dot) => &object_path[..dir_len + dot],
        None => object_path,
    }
}

/// Parses `INST_<digits>_` at the start of `leaf`, returning the id and the
/// prefix length in bytes.
fn parse_leaf_prefix(leaf: &str) -> Option<(InstanceId, usize)> {
    let rest = leaf.strip_prefix(INSTANCE_PREFIX)?.strip_prefix('_')?;
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || rest.as_bytes().get(digits) != Some(&b'_') {
        return None;
    }
    let raw = rest[..digits].parse::<u64>().ok()?;
    let len = INSTANCE_PREFIX.len() + 1 + digits + 1;
    Some((InstanceId::new(raw), len))
}

/// Returns `true` when the leaf of `path` carries an instance prefix.
///
/// Intermediate directory segments are never inspected.
#[must_use]
pub fn has_prefix(path: &str) -> bool {
    parse_leaf_prefix(leaf_name(path)).is_some()
}

/// Returns the instance namespace encoded in the leaf of `path`, if any.
#[must_use]
pub fn instance_of(path: &str) -> Option<InstanceId> {
    parse_leaf_prefix(leaf_name(path)).map(|(id, _)| id)
}

fn join(dir: &str, leaf: &str) -> String {
    if dir.is_empty() {
        leaf.to_owned()
    } else {
        format!("{dir}/{leaf}")
    }
}

/// Removes `prefix` from the leaf of `path`.
///
/// Paths whose leaf does not start with `prefix` come back unchanged.
#[must_use]
pub fn strip_prefix(path: &str, prefix: &str) -> String {
    match leaf_name(path).strip_prefix(prefix) {
        Some(rest) if !prefix.is_empty() => join(package_dir(path), rest),
        _ => path.to_owned(),
    }
}

/// Moves `path` into the namespace of instance `id`.
///
/// Idempotent: a path whose leaf already carries an instance prefix is
/// returned unchanged.
#[must_use]
pub fn namespaced_path(path: &str, id: InstanceId) -> String {
    if has_prefix(path) {
        return path.to_owned();
    }
    let prefixed = format!("{}{}", build_prefix(id), leaf_name(path));
    join(package_dir(path), &prefixed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEVEN: InstanceId = InstanceId::new(7);

    #[test]
    fn prefix_shape() {
        assert_eq!(build_prefix(SEVEN), "INST_7_");
    }

    #[test]
    fn namespacing_touches_only_the_leaf() {
        assert_eq!(namespaced_path("Scenes/Showcase", SEVEN), "Scenes/INST_7_Showcase");
        assert_eq!(
            namespaced_path("Game/Maps/Interiors/Hall", SEVEN),
            "Game/Maps/Interiors/INST_7_Hall"
        );
        assert_eq!(namespaced_path("Showcase", SEVEN), "INST_7_Showcase");
        assert_eq!(
            namespaced_path("Scenes/Showcase.Showcase", SEVEN),
            "Scenes/INST_7_Showcase.Showcase"
        );
    }

    #[test]
    fn prefixed_directories_are_not_leaf_prefixes() {
        assert!(!has_prefix("INST_3_Dir/Showcase"));
        assert!(has_prefix("Dir/INST_3_Showcase"));
        assert_eq!(
            namespaced_path("INST_3_Dir/Showcase", SEVEN),
            "INST_3_Dir/INST_7_Showcase"
        );
    }

    #[test]
    fn prefix_requires_digits_and_separator() {
        assert!(!has_prefix("Scenes/INST_Showcase"));
        assert!(!has_prefix("Scenes/INST_12Showcase"));
        assert!(!has_prefix("Scenes/INSTANT_1_Showcase"));
        assert_eq!(instance_of("Scenes/INST_12_Showcase"), Some(InstanceId::new(12)));
        assert_eq!(instance_of("Scenes/Showcase"), None);
    }

    #[test]
    fn already_namespaced_paths_are_left_alone() {
        let once = namespaced_path("Scenes/Showcase", SEVEN);
        assert_eq!(namespaced_path(&once, SEVEN), once);
        assert_eq!(namespaced_path(&once, InstanceId::new(8)), once);
    }

    #[test]
    fn strip_only_removes_the_matching_prefix() {
        assert_eq!(strip_prefix("Scenes/INST_7_Showcase", "INST_7_"), "Scenes/Showcase");
        assert_eq!(strip_prefix("Scenes/INST_8_Showcase", "INST_7_"), "Scenes/INST_8_Showcase");
        assert_eq!(strip_prefix("INST_7_Showcase", "INST_7_"), "Showcase");
        assert_eq!(strip_prefix("Scenes/Showcase", ""), "Scenes/Showcase");
    }

    #[test]
    fn package_of_drops_object_name() {
        assert_eq!(package_of("Scenes/Showcase.Showcase"), "Scenes/Showcase");
        assert_eq!(package_of("Scenes/Showcase"), "Scenes/Showcase");
        assert_eq!(package_of("Sce.nes/Showcase"), "Sce.nes/Showcase");
        assert_eq!(package_of("Showcase.Showcase"), "Showcase");
    }
}
