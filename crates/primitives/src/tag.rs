//! Metadata tags attached to contracts, contract methods, and delegate types.

use std::fmt;

/// A named metadata marker.
///
/// Tags placed on a delegate base shape with [`Tag::inherited`] are copied
/// into every shape that extends it; plain tags stay on the declaring shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
	name: &'static str,
	inherited: bool,
}

impl Tag {
	/// Creates a non-inherited tag.
	pub const fn new(name: &'static str) -> Self {
		Self {
			name,
			inherited: false,
		}
	}

	/// Marks this tag as inherited by extending shapes.
	pub const fn inherited(self) -> Self {
		Self {
			inherited: true,
			..self
		}
	}

	/// Returns the tag name.
	pub const fn name(&self) -> &'static str {
		self.name
	}

	/// Returns true if extending shapes inherit this tag.
	pub const fn is_inherited(&self) -> bool {
		self.inherited
	}
}

impl fmt::Display for Tag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "@{}", self.name)
	}
}

/// Insertion-ordered set of tags, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
	tags: Vec<Tag>,
}

impl TagSet {
	/// Creates an empty set.
	pub const fn new() -> Self {
		Self { tags: Vec::new() }
	}

	/// Inserts a tag; returns false if a tag with the same name was present.
	pub fn insert(&mut self, tag: Tag) -> bool {
		if self.contains(tag.name) {
			return false;
		}
		self.tags.push(tag);
		true
	}

	/// Inserts every tag from `other`.
	pub fn extend_from(&mut self, other: &TagSet) {
		for tag in &other.tags {
			self.insert(*tag);
		}
	}

	/// Returns true if a tag with `name` is present.
	pub fn contains(&self, name: &str) -> bool {
		self.tags.iter().any(|t| t.name == name)
	}

	/// Returns the tag named `name`.
	pub fn get(&self, name: &str) -> Option<&Tag> {
		self.tags.iter().find(|t| t.name == name)
	}

	/// Returns tags in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = &Tag> + '_ {
		self.tags.iter()
	}

	/// Returns only the tags marked as inherited.
	pub fn inherited(&self) -> TagSet {
		self.tags.iter().filter(|t| t.inherited).copied().collect()
	}

	pub fn len(&self) -> usize {
		self.tags.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tags.is_empty()
	}
}

impl FromIterator<Tag> for TagSet {
	fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
		let mut set = TagSet::new();
		for tag in iter {
			set.insert(tag);
		}
		set
	}
}

impl<'a> IntoIterator for &'a TagSet {
	type Item = &'a Tag;
	type IntoIter = std::slice::Iter<'a, Tag>;

	fn into_iter(self) -> Self::IntoIter {
		self.tags.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn duplicate_names_are_collapsed() {
		let mut set = TagSet::new();
		assert!(set.insert(Tag::new("Cool")));
		assert!(!set.insert(Tag::new("Cool").inherited()));
		assert_eq!(set.len(), 1);
		assert!(!set.get("Cool").unwrap().is_inherited());
	}

	#[test]
	fn inherited_subset() {
		let set: TagSet = [Tag::new("Beans").inherited(), Tag::new("Local")]
			.into_iter()
			.collect();
		let inherited = set.inherited();
		assert!(inherited.contains("Beans"));
		assert!(!inherited.contains("Local"));
	}
}
