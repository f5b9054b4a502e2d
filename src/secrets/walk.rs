//! Field discovery over arbitrary configuration graphs.
//!
//! Configuration types describe their own shape through [`Walk`]: each value lists
//! the children a traversal may descend into. [`find_all`] runs a breadth-first
//! worklist over that shape and returns every reachable value of a requested type
//! together with a structural path such as `Config.targets[2].auth.token`.
//!
//! - Struct fields are only visited if the type lists them (see [`walk_fields!`]);
//!   types without a `Walk` impl cannot be reached at all.
//! - `Box`, `Arc` and `Rc` are transparent. Their pointee address is tracked, so
//!   shared or self-referential graphs are descended only once.
//! - `Box<dyn Walk>` / `Arc<dyn Walk>` resolve to the concrete value.
//! - Map entries are visited in sorted key order; keys are visited too.
//! - Depth is bounded; exceeding it is an error naming the offending path.

use super::error::{Result, SecretsError};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Default bound on traversal depth.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Upcasts used by the traversal. Implemented for every sized [`Walk`] type and
/// reachable through `dyn Walk` as a supertrait.
pub trait AsWalk {
    fn as_any(&self) -> &dyn Any;
    fn as_walk(&self) -> &dyn Walk;
}

impl<T: Walk> AsWalk for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_walk(&self) -> &dyn Walk {
        self
    }
}

/// A value that can be traversed during field discovery.
pub trait Walk: AsWalk + 'static {
    /// Push the children a traversal should visit. Leaves push nothing.
    fn walk_children<'a>(&'a self, _children: &mut Children<'a>) {}
}

/// How a child was reached from its parent.
#[derive(Debug, Clone)]
enum Segment {
    Field(&'static str),
    Index(usize),
    Key(String),
    MapKey(String),
    Transparent,
}

struct Child<'a> {
    segment: Segment,
    value: &'a dyn Walk,
    identity: Option<(usize, TypeId)>,
}

/// Collector handed to [`Walk::walk_children`].
pub struct Children<'a> {
    items: Vec<Child<'a>>,
}

impl<'a> Children<'a> {
    fn new() -> Self {
        Self { items: Vec::new() }
    }

    fn push(&mut self, segment: Segment, value: &'a dyn Walk, identity: Option<(usize, TypeId)>) {
        self.items.push(Child { segment, value, identity });
    }

    /// A named struct field.
    pub fn field(&mut self, name: &'static str, value: &'a dyn Walk) {
        self.push(Segment::Field(name), value, None);
    }

    /// A sequence element.
    pub fn index(&mut self, index: usize, value: &'a dyn Walk) {
        self.push(Segment::Index(index), value, None);
    }

    /// A map value, labeled by its key.
    pub fn key(&mut self, label: String, value: &'a dyn Walk) {
        self.push(Segment::Key(label), value, None);
    }

    /// A map key itself.
    pub fn map_key(&mut self, label: String, key: &'a dyn Walk) {
        self.push(Segment::MapKey(label), key, None);
    }

    /// A wrapped value that adds nothing to the path (e.g. `Option`).
    pub fn inner(&mut self, value: &'a dyn Walk) {
        self.push(Segment::Transparent, value, None);
    }

    /// The target of a pointer. Each distinct target is descended at most once.
    pub fn pointee<T: ?Sized + 'static>(&mut self, target: &'a T, value: &'a dyn Walk) {
        let address = target as *const T as *const () as usize;
        self.push(Segment::Transparent, value, Some((address, TypeId::of::<T>())));
    }
}

/// One discovered value.
pub struct Found<'a, T> {
    pub path: String,
    pub depth: usize,
    pub value: &'a T,
}

impl<T> fmt::Debug for Found<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Found").field("path", &self.path).field("depth", &self.depth).finish()
    }
}

/// Result of [`find_all`]: discovered values ordered shallowest first, plus a
/// lookup from value address to path.
pub struct Discovered<'a, T> {
    found: Vec<Found<'a, T>>,
    by_address: HashMap<usize, usize>,
}

impl<T> fmt::Debug for Discovered<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.found.iter()).finish()
    }
}

impl<'a, T> Discovered<'a, T> {
    pub fn len(&self) -> usize {
        self.found.len()
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Found<'a, T>> {
        self.found.iter()
    }

    /// Path at which `value` was discovered.
    pub fn path_of(&self, value: &T) -> Option<&str> {
        let address = value as *const T as usize;
        self.by_address.get(&address).map(|&i| self.found[i].path.as_str())
    }

    pub fn paths(&self) -> Vec<&str> {
        self.found.iter().map(|f| f.path.as_str()).collect()
    }

    pub fn into_vec(self) -> Vec<Found<'a, T>> {
        self.found
    }
}

struct Node<'a> {
    value: &'a dyn Walk,
    path: String,
    depth: usize,
}

/// Find every value of type `T` reachable from `root`.
///
/// Paths start with the root's type name. Returns
/// [`SecretsError::DepthExceeded`] if any path goes deeper than `max_depth`
/// named segments (fields, indices, keys).
pub fn find_all<'a, T, R>(root: &'a R, max_depth: usize) -> Result<Discovered<'a, T>>
where
    T: Walk,
    R: Walk,
{
    let mut found = Vec::new();
    let mut by_address = HashMap::new();
    let mut visited: HashSet<(usize, TypeId)> = HashSet::new();
    let mut queue = VecDeque::new();

    queue.push_back(Node { value: root.as_walk(), path: type_label::<R>(), depth: 0 });

    while let Some(node) = queue.pop_front() {
        if let Some(target) = node.value.as_any().downcast_ref::<T>() {
            by_address.insert(target as *const T as usize, found.len());
            found.push(Found { path: node.path.clone(), depth: node.depth, value: target });
        }

        let mut children = Children::new();
        node.value.walk_children(&mut children);

        for child in children.items {
            if let Some(identity) = child.identity {
                if !visited.insert(identity) {
                    continue;
                }
            }

            let (path, depth) = match &child.segment {
                Segment::Field(name) => (format!("{}.{}", node.path, name), node.depth + 1),
                Segment::Index(i) => (format!("{}[{}]", node.path, i), node.depth + 1),
                Segment::Key(label) => (format!("{}[{}]", node.path, label), node.depth + 1),
                Segment::MapKey(label) => (format!("{}<key {}>", node.path, label), node.depth + 1),
                Segment::Transparent => (node.path.clone(), node.depth),
            };

            if depth > max_depth {
                return Err(SecretsError::DepthExceeded { path, max_depth });
            }

            queue.push_back(Node { value: child.value, path, depth });
        }
    }

    Ok(Discovered { found, by_address })
}

/// Unqualified type name without generic arguments.
fn type_label<R: ?Sized>() -> String {
    let full = std::any::type_name::<R>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Implement [`Walk`] for a struct by listing the fields discovery may visit.
///
/// ```rust,ignore
/// #[derive(Deserialize)]
/// pub struct Config {
///     pub targets: Vec<Target>,
///     pub api_key: Field,
///     cache_dir: PathBuf, // not listed: never visited
/// }
///
/// walk_fields!(Config { targets, api_key });
/// ```
#[macro_export]
macro_rules! walk_fields {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::secrets::walk::Walk for $ty {
            fn walk_children<'a>(&'a self, children: &mut $crate::secrets::walk::Children<'a>) {
                $( children.field(stringify!($field), &self.$field); )*
            }
        }
    };
}

macro_rules! impl_leaf {
    ($($ty:ty),* $(,)?) => {
        $( impl Walk for $ty {} )*
    };
}

impl_leaf!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    String,
    &'static str,
    Duration,
    PathBuf,
    serde_yaml::Value,
    serde_json::Value,
);

impl<T: Walk> Walk for Option<T> {
    fn walk_children<'a>(&'a self, children: &mut Children<'a>) {
        if let Some(value) = self {
            children.inner(value);
        }
    }
}

impl<T: Walk> Walk for Vec<T> {
    fn walk_children<'a>(&'a self, children: &mut Children<'a>) {
        for (i, value) in self.iter().enumerate() {
            children.index(i, value);
        }
    }
}

impl<T: Walk, const N: usize> Walk for [T; N] {
    fn walk_children<'a>(&'a self, children: &mut Children<'a>) {
        for (i, value) in self.iter().enumerate() {
            children.index(i, value);
        }
    }
}

impl<T: Walk + ?Sized> Walk for Box<T> {
    fn walk_children<'a>(&'a self, children: &mut Children<'a>) {
        let target: &T = self;
        children.pointee(target, target.as_walk());
    }
}

impl<T: Walk + ?Sized> Walk for Arc<T> {
    fn walk_children<'a>(&'a self, children: &mut Children<'a>) {
        let target: &T = self;
        children.pointee(target, target.as_walk());
    }
}

impl<T: Walk + ?Sized> Walk for Rc<T> {
    fn walk_children<'a>(&'a self, children: &mut Children<'a>) {
        let target: &T = self;
        children.pointee(target, target.as_walk());
    }
}

impl<T: Walk> Walk for OnceLock<T> {
    fn walk_children<'a>(&'a self, children: &mut Children<'a>) {
        if let Some(value) = self.get() {
            children.inner(value);
        }
    }
}

impl<K, V> Walk for BTreeMap<K, V>
where
    K: Walk + fmt::Debug,
    V: Walk,
{
    fn walk_children<'a>(&'a self, children: &mut Children<'a>) {
        for (key, value) in self {
            let label = format!("{:?}", key);
            children.map_key(label.clone(), key);
            children.key(label, value);
        }
    }
}

impl<K, V, S> Walk for HashMap<K, V, S>
where
    K: Walk + Ord + fmt::Debug,
    V: Walk,
    S: 'static,
{
    fn walk_children<'a>(&'a self, children: &mut Children<'a>) {
        let mut entries: Vec<(&'a K, &'a V)> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in entries {
            let label = format!("{:?}", key);
            children.map_key(label.clone(), key);
            children.key(label, value);
        }
    }
}
