//! # Runtime type values for events.
//!
//! [`Class`] is the runtime handle of an [`EventType`]: it knows the type's
//! name, its direct supertypes and the transitive closure of its ancestors,
//! and how to view a value of the type as a value of any ancestor.
//!
//! ## Registry
//! ```text
//! Class::of::<T>() ──► CLASSES (TypeId → Class, process lifetime)
//!                        │ miss
//!                        └─► T::supertypes(..) ─► Class::of::<P>() for each P
//!                              └─► ancestors = direct supers, then their ancestors
//! ```
//!
//! ## Rules
//! - Classes are built once per type and never evicted.
//! - Identity, equality and hashing use the `TypeId` only.
//! - Ancestor order is stable: direct supertypes in declaration order, then
//!   each supertype's own ancestors; the first occurrence of a type wins.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use super::event::{Event, EventType, Supertypes};

static CLASSES: OnceLock<DashMap<TypeId, Class>> = OnceLock::new();

thread_local! {
    /// Types whose supertypes are being resolved on this thread.
    static RESOLVING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

fn classes() -> &'static DashMap<TypeId, Class> {
    CLASSES.get_or_init(DashMap::new)
}

/// Views a value of one type as a value of a direct supertype.
pub(crate) trait Projection: Send + Sync {
    fn project<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any>;
}

/// Edge from a type to one of its direct supertypes.
pub(crate) struct SuperEdge {
    pub(crate) class: Class,
    pub(crate) projection: Box<dyn Projection>,
}

struct ClassInfo {
    id: TypeId,
    name: &'static str,
    supers: Box<[SuperEdge]>,
    direct: Box<[Class]>,
    ancestors: Box<[Class]>,
}

/// Pops `0` from the resolving stack on drop, also when `supertypes` unwinds.
struct ResolvingGuard(TypeId);

impl Drop for ResolvingGuard {
    fn drop(&mut self) {
        let id = self.0;
        RESOLVING.with(|stack| stack.borrow_mut().retain(|it| *it != id));
    }
}

/// Runtime handle of an event type.
///
/// Cheap to clone. Two handles are equal iff they describe the same Rust type.
///
/// # Example
/// ```
/// use hierbus::{Class, EventType, Supertypes};
///
/// struct Base;
/// impl EventType for Base {}
///
/// struct Child { base: Base }
/// impl EventType for Child {
///     fn supertypes(types: &mut Supertypes<Self>) {
///         types.extends(|c: &Child| &c.base);
///     }
/// }
///
/// let base = Class::of::<Base>();
/// let child = Class::of::<Child>();
/// assert!(base.is_assignable_from(&child));
/// assert!(!child.is_assignable_from(&base));
/// assert_eq!(child.ancestors(), &[base]);
/// ```
#[derive(Clone)]
pub struct Class(Arc<ClassInfo>);

impl Class {
    /// Returns the class of `T`, building and memoizing it on first use.
    pub fn of<T: EventType>() -> Class {
        let id = TypeId::of::<T>();
        if let Some(found) = classes().get(&id) {
            return found.value().clone();
        }

        let cyclic = RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&id) {
                true
            } else {
                stack.push(id);
                false
            }
        });
        assert!(
            !cyclic,
            "cyclic event type hierarchy through `{}`",
            std::any::type_name::<T>()
        );

        let mut supertypes = Supertypes::<T>::new();
        {
            let _resolving = ResolvingGuard(id);
            T::supertypes(&mut supertypes);
        }

        let class = Class::build(id, std::any::type_name::<T>(), supertypes.into_edges());
        tracing::trace!(class = class.name(), ancestors = class.ancestors().len(), "class resolved");

        let entry = classes().entry(id).or_insert(class);
        entry.value().clone()
    }

    fn build(id: TypeId, name: &'static str, supers: Vec<SuperEdge>) -> Class {
        let direct: Vec<Class> = supers.iter().map(|edge| edge.class.clone()).collect();

        let mut ancestors: Vec<Class> = Vec::new();
        for class in direct.iter().chain(direct.iter().flat_map(|c| c.ancestors().iter())) {
            if class.0.id != id && !ancestors.contains(class) {
                ancestors.push(class.clone());
            }
        }

        Class(Arc::new(ClassInfo {
            id,
            name,
            supers: supers.into_boxed_slice(),
            direct: direct.into_boxed_slice(),
            ancestors: ancestors.into_boxed_slice(),
        }))
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// `TypeId` of the described type.
    pub fn type_id(&self) -> TypeId {
        self.0.id
    }

    /// Direct supertypes in declaration order.
    pub fn supertypes(&self) -> &[Class] {
        &self.0.direct
    }

    /// All ancestors (transitive closure of [`Class::supertypes`]).
    pub fn ancestors(&self) -> &[Class] {
        &self.0.ancestors
    }

    /// True if a value of `other` can be used where `self` is expected.
    pub fn is_assignable_from(&self, other: &Class) -> bool {
        self == other || other.ancestors().contains(self)
    }

    /// True if `event` is a value of this class or of one of its subtypes.
    pub fn is_instance(&self, event: &dyn Event) -> bool {
        self.is_assignable_from(&event.class())
    }

    /// Views `value` (a value of this class) as a value of `target`.
    ///
    /// Returns `None` if `target` is not this class or one of its ancestors,
    /// or if `value` is not actually of this class.
    pub(crate) fn project<'a>(&self, value: &'a dyn Any, target: TypeId) -> Option<&'a dyn Any> {
        if self.0.id == target {
            return Some(value);
        }
        let edge = self.0.supers.iter().find(|edge| {
            edge.class.0.id == target || edge.class.ancestors().iter().any(|a| a.0.id == target)
        })?;
        let up = edge.projection.project(value)?;
        edge.class.project(up, target)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.0.name)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Root;
    impl EventType for Root {}

    struct Tagged {
        root: Root,
    }
    impl EventType for Tagged {
        fn supertypes(types: &mut Supertypes<Self>) {
            types.extends(|t: &Tagged| &t.root);
        }
    }

    struct Marker;
    impl EventType for Marker {}

    // Diamond: Leaf -> (Tagged, Marker), Tagged -> Root
    struct Leaf {
        tagged: Tagged,
        marker: Marker,
    }
    impl EventType for Leaf {
        fn supertypes(types: &mut Supertypes<Self>) {
            types
                .extends(|l: &Leaf| &l.tagged)
                .extends(|l: &Leaf| &l.marker);
        }
    }

    static FLAKY_ARMED: AtomicBool = AtomicBool::new(true);

    struct Flaky {
        root: Root,
    }
    impl EventType for Flaky {
        fn supertypes(types: &mut Supertypes<Self>) {
            if FLAKY_ARMED.swap(false, Ordering::SeqCst) {
                panic!("supertypes failed");
            }
            types.extends(|f: &Flaky| &f.root);
        }
    }

    #[test]
    fn test_panicking_supertypes_leaves_no_stale_entry() {
        let first = std::panic::catch_unwind(Class::of::<Flaky>);
        assert!(first.is_err());

        let flaky = Class::of::<Flaky>();
        assert_eq!(flaky.ancestors(), &[Class::of::<Root>()]);
    }

    #[test]
    fn test_class_is_memoized() {
        let a = Class::of::<Leaf>();
        let b = Class::of::<Leaf>();
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn test_ancestor_order() {
        let leaf = Class::of::<Leaf>();
        let names: Vec<_> = leaf.ancestors().iter().cloned().collect();
        assert_eq!(
            names,
            vec![Class::of::<Tagged>(), Class::of::<Marker>(), Class::of::<Root>()]
        );
        assert_eq!(leaf.supertypes().len(), 2);
    }

    #[test]
    fn test_assignability() {
        let root = Class::of::<Root>();
        let leaf = Class::of::<Leaf>();
        assert!(root.is_assignable_from(&leaf));
        assert!(root.is_assignable_from(&root));
        assert!(!leaf.is_assignable_from(&root));
        assert!(!Class::of::<Marker>().is_assignable_from(&root));
    }

    #[test]
    fn test_is_instance() {
        let leaf = Leaf {
            tagged: Tagged { root: Root },
            marker: Marker,
        };
        assert!(Class::of::<Root>().is_instance(&leaf));
        assert!(Class::of::<Leaf>().is_instance(&leaf));
        assert!(!Class::of::<Leaf>().is_instance(&Root));
    }

    #[test]
    fn test_projection_walks_hierarchy() {
        let leaf = Leaf {
            tagged: Tagged { root: Root },
            marker: Marker,
        };
        let class = Class::of::<Leaf>();

        let root = class
            .project(&leaf, TypeId::of::<Root>())
            .and_then(|v| v.downcast_ref::<Root>());
        assert!(std::ptr::eq(root.unwrap(), &leaf.tagged.root));

        let marker = class.project(&leaf, TypeId::of::<Marker>());
        assert!(marker.is_some());

        assert!(class.project(&leaf, TypeId::of::<u8>()).is_none());
    }
}
