//! Set types for field path tracking.

use super::path::{Path, PathElement};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// PathElementSet is a sorted, deduplicated set of PathElements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathElementSet {
    members: Vec<PathElement>,
}

/// Which side(s) of a sorted merge end up in the result.
#[derive(Clone, Copy)]
struct Keep {
    left_only: bool,
    right_only: bool,
    both: bool,
}

impl PathElementSet {
    /// Creates a new empty set.
    pub fn new() -> Self {
        PathElementSet {
            members: Vec::new(),
        }
    }

    /// Creates a set from a vector of elements.
    pub fn from_vec(mut elements: Vec<PathElement>) -> Self {
        elements.sort();
        elements.dedup();
        PathElementSet { members: elements }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, element: &PathElement) -> bool {
        self.members.binary_search(element).is_ok()
    }

    /// Inserts an element, keeping the members sorted.
    pub fn insert(&mut self, element: PathElement) {
        if let Err(pos) = self.members.binary_search(&element) {
            self.members.insert(pos, element);
        }
    }

    /// Removes an element; returns whether it was present.
    pub fn remove(&mut self, element: &PathElement) -> bool {
        match self.members.binary_search(element) {
            Ok(pos) => {
                self.members.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.members.iter()
    }

    pub fn union(&self, other: &PathElementSet) -> PathElementSet {
        self.merge(other, Keep { left_only: true, right_only: true, both: true })
    }

    pub fn intersection(&self, other: &PathElementSet) -> PathElementSet {
        self.merge(other, Keep { left_only: false, right_only: false, both: true })
    }

    /// Returns `self - other`.
    pub fn difference(&self, other: &PathElementSet) -> PathElementSet {
        self.merge(other, Keep { left_only: true, right_only: false, both: false })
    }

    fn merge(&self, other: &PathElementSet, keep: Keep) -> PathElementSet {
        let (left, right) = (&self.members, &other.members);
        let mut result = Vec::with_capacity(left.len().max(right.len()));
        let (mut i, mut j) = (0, 0);

        while i < left.len() && j < right.len() {
            match left[i].cmp(&right[j]) {
                Ordering::Less => {
                    if keep.left_only {
                        result.push(left[i].clone());
                    }
                    i += 1;
                }
                Ordering::Greater => {
                    if keep.right_only {
                        result.push(right[j].clone());
                    }
                    j += 1;
                }
                Ordering::Equal => {
                    if keep.both {
                        result.push(left[i].clone());
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        if keep.left_only {
            result.extend(left[i..].iter().cloned());
        }
        if keep.right_only {
            result.extend(right[j..].iter().cloned());
        }

        PathElementSet { members: result }
    }
}

/// SetNodeMap maps PathElements to child Sets.
pub type SetNodeMap = BTreeMap<PathElement, Set>;

/// Set is a tree of field paths; a manager's ownership is one Set.
///
/// `members` holds the paths that end at this level, `children` the subtrees
/// of paths that continue below it. A path can be both a member and the
/// parent of deeper members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Set {
    pub members: PathElementSet,
    pub children: SetNodeMap,
}

impl Set {
    /// Creates a new empty set.
    pub fn new() -> Self {
        Set::default()
    }

    /// Creates a set holding the given paths.
    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Self {
        let mut set = Set::new();
        for path in paths {
            set.insert(path);
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.children.is_empty()
    }

    /// Returns the total number of paths in the set.
    pub fn len(&self) -> usize {
        self.members.len() + self.children.values().map(Set::len).sum::<usize>()
    }

    /// Returns true if the set contains the given path.
    pub fn has(&self, path: &Path) -> bool {
        self.has_path_elements(path.as_slice())
    }

    fn has_path_elements(&self, elements: &[PathElement]) -> bool {
        match elements {
            [] => false,
            [last] => self.members.contains(last),
            [first, rest @ ..] => self
                .children
                .get(first)
                .is_some_and(|child| child.has_path_elements(rest)),
        }
    }

    /// Inserts a path into the set. The empty path is ignored.
    pub fn insert(&mut self, path: &Path) {
        self.insert_path_elements(path.as_slice());
    }

    fn insert_path_elements(&mut self, elements: &[PathElement]) {
        match elements {
            [] => {}
            [last] => self.members.insert(last.clone()),
            [first, rest @ ..] => self
                .children
                .entry(first.clone())
                .or_default()
                .insert_path_elements(rest),
        }
    }

    /// Returns the union of two sets.
    pub fn union(&self, other: &Set) -> Set {
        let mut result = self.clone();
        result.union_into(other);
        result
    }

    fn union_into(&mut self, other: &Set) {
        self.members = self.members.union(&other.members);

        for (key, other_child) in &other.children {
            match self.children.get_mut(key) {
                Some(self_child) => self_child.union_into(other_child),
                None => {
                    self.children.insert(key.clone(), other_child.clone());
                }
            }
        }
    }

    /// Returns the intersection of two sets.
    pub fn intersection(&self, other: &Set) -> Set {
        let members = self.members.intersection(&other.members);

        let mut children = BTreeMap::new();
        for (key, self_child) in &self.children {
            if let Some(other_child) = other.children.get(key) {
                let child = self_child.intersection(other_child);
                if !child.is_empty() {
                    children.insert(key.clone(), child);
                }
            }
        }

        Set { members, children }
    }

    /// Returns the difference of two sets (self - other).
    pub fn difference(&self, other: &Set) -> Set {
        let members = self.members.difference(&other.members);

        let mut children = BTreeMap::new();
        for (key, self_child) in &self.children {
            let child = match other.children.get(key) {
                Some(other_child) => self_child.difference(other_child),
                None => self_child.clone(),
            };
            if !child.is_empty() {
                children.insert(key.clone(), child);
            }
        }

        Set { members, children }
    }

    /// Returns true if every path of this set is also in `other`.
    pub fn is_subset_of(&self, other: &Set) -> bool {
        self.difference(other).is_empty()
    }

    /// Removes every path of `other` from this set, along with everything
    /// beneath those paths.
    pub fn without_descendants_of(&self, other: &Set) -> Set {
        let mut members = PathElementSet::new();
        for member in self.members.iter() {
            if !other.members.contains(member) {
                members.insert(member.clone());
            }
        }

        let mut children = BTreeMap::new();
        for (key, self_child) in &self.children {
            if other.members.contains(key) {
                continue;
            }
            let child = match other.children.get(key) {
                Some(other_child) => self_child.without_descendants_of(other_child),
                None => self_child.clone(),
            };
            if !child.is_empty() {
                children.insert(key.clone(), child);
            }
        }

        Set { members, children }
    }

    /// Returns this set plus every ancestor of its paths.
    pub fn ancestor_closure(&self) -> Set {
        let mut result = self.clone();
        self.iterate(|path| {
            for ancestor in path.ancestors() {
                result.insert(&ancestor);
            }
        });
        result
    }

    /// Iterates over all paths in the set, in sorted order.
    pub fn iterate<F>(&self, mut f: F)
    where
        F: FnMut(&Path),
    {
        self.iterate_with_path(&mut Path::new(), &mut f);
    }

    fn iterate_with_path<F>(&self, current_path: &mut Path, f: &mut F)
    where
        F: FnMut(&Path),
    {
        let mut members = self.members.iter().peekable();
        let mut children = self.children.iter().peekable();

        // Walk members and children together so a path is always visited
        // right before the paths beneath it.
        loop {
            let visit_member = match (members.peek(), children.peek()) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(m), Some((k, _))) => *m <= *k,
            };

            if visit_member {
                if let Some(member) = members.next() {
                    current_path.push(member.clone());
                    f(current_path);
                    current_path.pop();
                }
            } else if let Some((key, child)) = children.next() {
                current_path.push(key.clone());
                child.iterate_with_path(current_path, f);
                current_path.pop();
            }
        }
    }

    /// Collects every path of the set, in sorted order.
    pub fn paths(&self) -> Vec<Path> {
        let mut paths = Vec::with_capacity(self.len());
        self.iterate(|path| paths.push(path.clone()));
        paths
    }
}

impl FromIterator<Path> for Set {
    fn from_iter<T: IntoIterator<Item = Path>>(iter: T) -> Self {
        let mut set = Set::new();
        for path in iter {
            set.insert(&path);
        }
        set
    }
}
