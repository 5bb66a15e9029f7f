//! In-memory managed heap
//!
//! A small object model sufficient to run and roll back class initializers:
//! classes, plain instances, primitive and reference arrays, strings and
//! string-resolution caches. Objects are addressed by [`ObjRef`] handles that
//! the [`crate::MovingCollector`] reassigns on every collection.
//!
//! Thread safety: all state sits behind one `parking_lot::RwLock`; volatile
//! accesses additionally issue a sequentially consistent fence.

use crate::object::{Body, HeapObject, Space};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{fence, AtomicU64, Ordering};
use txlog_core::{
    ArrayElement, ComponentType, Error, FieldKind, FieldOffset, FieldValue, Heap, ObjRef,
    PrimitiveType, Result, StringIndex,
};

const FIRST_ADDRESS: u64 = 0x1000;
const OBJECT_ALIGNMENT: u64 = 0x10;

/// Key for the lazily created array classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ArrayClassKey {
    Primitive(PrimitiveType),
    Reference,
}

struct HeapState {
    objects: FxHashMap<ObjRef, HeapObject>,
    next_address: u64,
    has_image_spaces: bool,
    class_class: ObjRef,
    string_class: Option<ObjRef>,
    string_cache_class: Option<ObjRef>,
    array_classes: FxHashMap<ArrayClassKey, ObjRef>,
}

impl HeapState {
    fn allocate_address(&mut self) -> ObjRef {
        let addr = self.next_address;
        self.next_address += OBJECT_ALIGNMENT;
        ObjRef::from_raw(addr)
    }

    fn insert(&mut self, class: ObjRef, space: Space, body: Body) -> ObjRef {
        let obj = self.allocate_address();
        if space == Space::Image {
            self.has_image_spaces = true;
        }
        self.objects.insert(obj, HeapObject::new(class, space, body));
        obj
    }

    fn get(&self, obj: ObjRef) -> Result<&HeapObject> {
        self.objects.get(&obj).ok_or(Error::UnknownObject(obj))
    }

    fn get_mut(&mut self, obj: ObjRef) -> Result<&mut HeapObject> {
        self.objects.get_mut(&obj).ok_or(Error::UnknownObject(obj))
    }

    fn define_class(&mut self, name: &str, space: Space) -> ObjRef {
        let class_class = self.class_class;
        self.insert(
            class_class,
            space,
            Body::Class {
                name: name.to_string(),
                extension_referenceable: false,
            },
        )
    }

    fn array_class(&mut self, key: ArrayClassKey) -> ObjRef {
        if let Some(class) = self.array_classes.get(&key) {
            return *class;
        }
        let name = match key {
            ArrayClassKey::Primitive(ty) => format!("{:?}[]", ty).to_lowercase(),
            ArrayClassKey::Reference => "java.lang.Object[]".to_string(),
        };
        let class = self.define_class(&name, Space::Regular);
        self.array_classes.insert(key, class);
        class
    }

    fn well_known_class(
        &mut self,
        name: &str,
        slot: fn(&mut HeapState) -> &mut Option<ObjRef>,
    ) -> ObjRef {
        if let Some(class) = *slot(self) {
            return class;
        }
        let class = self.define_class(name, Space::Regular);
        *slot(self) = Some(class);
        class
    }
}

/// Counters exposed for observation in tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Field reads performed with volatile ordering
    pub volatile_reads: u64,
    /// Field writes performed with volatile ordering
    pub volatile_writes: u64,
    /// Completed moving collections
    pub collections: u64,
}

/// Managed heap held entirely in process memory
pub struct InMemoryHeap {
    state: RwLock<HeapState>,
    volatile_reads: AtomicU64,
    volatile_writes: AtomicU64,
    collections: AtomicU64,
}

impl InMemoryHeap {
    /// Create an empty heap with no image spaces
    ///
    /// Image spaces appear as soon as the first image object is allocated.
    pub fn new() -> Self {
        let class_class = ObjRef::from_raw(FIRST_ADDRESS);
        let mut objects = FxHashMap::default();
        objects.insert(
            class_class,
            HeapObject::new(
                class_class,
                Space::Regular,
                Body::Class {
                    name: "java.lang.Class".to_string(),
                    extension_referenceable: false,
                },
            ),
        );
        InMemoryHeap {
            state: RwLock::new(HeapState {
                objects,
                next_address: FIRST_ADDRESS + OBJECT_ALIGNMENT,
                has_image_spaces: false,
                class_class,
                string_class: None,
                string_cache_class: None,
                array_classes: FxHashMap::default(),
            }),
            volatile_reads: AtomicU64::new(0),
            volatile_writes: AtomicU64::new(0),
            collections: AtomicU64::new(0),
        }
    }

    /// Define a class in movable space
    pub fn define_class(&self, name: &str) -> ObjRef {
        self.state.write().define_class(name, Space::Regular)
    }

    /// Define a class in the platform image
    pub fn define_image_class(&self, name: &str) -> ObjRef {
        self.state.write().define_class(name, Space::Image)
    }

    /// Mark `class` as referenceable from an image extension
    ///
    /// # Errors
    ///
    /// Returns an error if `class` is not a live class.
    pub fn allow_extension_reference(&self, class: ObjRef) -> Result<()> {
        let mut state = self.state.write();
        match &mut state.get_mut(class)?.body {
            Body::Class {
                extension_referenceable,
                ..
            } => {
                *extension_referenceable = true;
                Ok(())
            }
            _ => Err(Error::UnknownObject(class)),
        }
    }

    /// Allocate an instance of `class` in movable space
    ///
    /// # Errors
    ///
    /// Returns an error if `class` is not a live class.
    pub fn alloc_instance(&self, class: ObjRef) -> Result<ObjRef> {
        self.alloc_instance_in(class, Space::Regular)
    }

    /// Allocate an instance of `class` in the platform image
    ///
    /// # Errors
    ///
    /// Returns an error if `class` is not a live class.
    pub fn alloc_image_instance(&self, class: ObjRef) -> Result<ObjRef> {
        self.alloc_instance_in(class, Space::Image)
    }

    fn alloc_instance_in(&self, class: ObjRef, space: Space) -> Result<ObjRef> {
        let mut state = self.state.write();
        if !state.get(class)?.is_class() {
            return Err(Error::UnknownObject(class));
        }
        Ok(state.insert(class, space, Body::Instance))
    }

    /// Allocate a zero-filled primitive array
    pub fn alloc_primitive_array(&self, component: PrimitiveType, length: usize) -> ObjRef {
        let mut state = self.state.write();
        let class = state.array_class(ArrayClassKey::Primitive(component));
        state.insert(
            class,
            Space::Regular,
            Body::PrimitiveArray {
                component,
                elements: vec![component.zero(); length],
            },
        )
    }

    /// Allocate a null-filled reference array
    pub fn alloc_reference_array(&self, length: usize) -> ObjRef {
        let mut state = self.state.write();
        let class = state.array_class(ArrayClassKey::Reference);
        state.insert(class, Space::Regular, Body::ReferenceArray { length })
    }

    /// Allocate a string object
    pub fn alloc_string(&self, value: &str) -> ObjRef {
        let mut state = self.state.write();
        let class = state.well_known_class("java.lang.String", |s| &mut s.string_class);
        state.insert(
            class,
            Space::Regular,
            Body::String {
                value: value.to_string(),
            },
        )
    }

    /// Allocate a string-resolution cache with `num_strings` unresolved slots
    pub fn alloc_string_cache(&self, num_strings: u32) -> ObjRef {
        let mut state = self.state.write();
        let class = state.well_known_class("java.lang.DexCache", |s| &mut s.string_cache_class);
        state.insert(
            class,
            Space::Regular,
            Body::StringCache {
                slots: vec![None; num_strings as usize],
            },
        )
    }

    /// Contents of a string object
    ///
    /// # Errors
    ///
    /// Returns an error if `string` is not a live string.
    pub fn string_value(&self, string: ObjRef) -> Result<String> {
        match &self.state.read().get(string)?.body {
            Body::String { value } => Ok(value.clone()),
            _ => Err(Error::UnknownObject(string)),
        }
    }

    /// Name of a class
    ///
    /// # Errors
    ///
    /// Returns an error if `class` is not a live class.
    pub fn class_name(&self, class: ObjRef) -> Result<String> {
        match &self.state.read().get(class)?.body {
            Body::Class { name, .. } => Ok(name.clone()),
            _ => Err(Error::UnknownObject(class)),
        }
    }

    /// Whether `obj` names a live object
    pub fn contains(&self, obj: ObjRef) -> bool {
        self.state.read().objects.contains_key(&obj)
    }

    /// Number of live objects
    pub fn object_count(&self) -> usize {
        self.state.read().objects.len()
    }

    /// Snapshot of the access counters
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            volatile_reads: self.volatile_reads.load(Ordering::Relaxed),
            volatile_writes: self.volatile_writes.load(Ordering::Relaxed),
            collections: self.collections.load(Ordering::Relaxed),
        }
    }

    /// Give every movable object a fresh address and rewrite all internal
    /// references. Returns the old -> new mapping of moved objects.
    pub(crate) fn relocate_movable(&self) -> FxHashMap<ObjRef, ObjRef> {
        let mut state = self.state.write();
        let movable: Vec<ObjRef> = {
            let mut v: Vec<ObjRef> = state
                .objects
                .iter()
                .filter(|(_, o)| o.space == Space::Regular)
                .map(|(r, _)| *r)
                .collect();
            v.sort();
            v
        };

        let mut forwarding = FxHashMap::default();
        for old in movable {
            let new = state.allocate_address();
            forwarding.insert(old, new);
        }

        let forward = |r: ObjRef| forwarding.get(&r).copied().unwrap_or(r);
        let objects = std::mem::take(&mut state.objects);
        state.objects = objects
            .into_iter()
            .map(|(addr, mut obj)| {
                obj.forward_references(&forward);
                (forward(addr), obj)
            })
            .collect();
        state.class_class = forward(state.class_class);
        state.string_class = state.string_class.map(forward);
        state.string_cache_class = state.string_cache_class.map(forward);
        for class in state.array_classes.values_mut() {
            *class = forward(*class);
        }
        self.collections.fetch_add(1, Ordering::Relaxed);
        forwarding
    }
}

impl Default for InMemoryHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap for InMemoryHeap {
    fn is_in_image_space(&self, obj: ObjRef) -> bool {
        self.state
            .read()
            .objects
            .get(&obj)
            .is_some_and(|o| o.space == Space::Image)
    }

    fn has_image_spaces(&self) -> bool {
        self.state.read().has_image_spaces
    }

    fn can_reference_from_image_extension(&self, class: ObjRef) -> bool {
        let state = self.state.read();
        match state.objects.get(&class) {
            Some(obj) => match &obj.body {
                Body::Class {
                    extension_referenceable,
                    ..
                } => obj.space == Space::Regular || *extension_referenceable,
                _ => false,
            },
            None => false,
        }
    }

    fn is_class(&self, obj: ObjRef) -> bool {
        self.state
            .read()
            .objects
            .get(&obj)
            .is_some_and(HeapObject::is_class)
    }

    fn class_of(&self, obj: ObjRef) -> Result<ObjRef> {
        Ok(self.state.read().get(obj)?.class)
    }

    fn array_component(&self, obj: ObjRef) -> Option<ComponentType> {
        self.state.read().objects.get(&obj).and_then(HeapObject::component)
    }

    fn read_field(
        &self,
        obj: ObjRef,
        offset: FieldOffset,
        kind: FieldKind,
        is_volatile: bool,
    ) -> Result<FieldValue> {
        if is_volatile {
            fence(Ordering::SeqCst);
            self.volatile_reads.fetch_add(1, Ordering::Relaxed);
        }
        self.state.read().get(obj)?.read_field(obj, offset, kind)
    }

    fn write_field(
        &self,
        obj: ObjRef,
        offset: FieldOffset,
        value: FieldValue,
        is_volatile: bool,
    ) -> Result<()> {
        self.state.write().get_mut(obj)?.write_field(obj, offset, value)?;
        if is_volatile {
            fence(Ordering::SeqCst);
            self.volatile_writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn array_length(&self, array: ObjRef) -> Result<usize> {
        self.state
            .read()
            .get(array)?
            .length()
            .ok_or(Error::NotAnArray(array))
    }

    fn read_element(&self, array: ObjRef, index: usize) -> Result<ArrayElement> {
        let state = self.state.read();
        let (_, elements) = state.get(array)?.elements(array)?;
        elements.get(index).copied().ok_or(Error::IndexOutOfBounds {
            array,
            index,
            length: elements.len(),
        })
    }

    fn write_element(&self, array: ObjRef, index: usize, value: ArrayElement) -> Result<()> {
        let mut state = self.state.write();
        let (component, elements) = state.get_mut(array)?.elements_mut(array)?;
        if value.primitive_type() != component {
            return Err(Error::ElementTypeMismatch {
                array,
                expected: component,
                actual: value.primitive_type(),
            });
        }
        let length = elements.len();
        let slot = elements
            .get_mut(index)
            .ok_or(Error::IndexOutOfBounds { array, index, length })?;
        *slot = value;
        Ok(())
    }

    fn num_strings(&self, cache: ObjRef) -> Result<u32> {
        Ok(self.state.read().get(cache)?.string_slots(cache)?.len() as u32)
    }

    fn resolved_string(&self, cache: ObjRef, index: StringIndex) -> Result<Option<ObjRef>> {
        let state = self.state.read();
        let slots = state.get(cache)?.string_slots(cache)?;
        slots
            .get(index.0 as usize)
            .copied()
            .ok_or_else(|| Error::string_index(cache, index, slots.len() as u32))
    }

    fn set_resolved_string(&self, cache: ObjRef, index: StringIndex, string: ObjRef) -> Result<()> {
        *self.state.write().get_mut(cache)?.string_slot_mut(cache, index)? = Some(string);
        Ok(())
    }

    fn clear_resolved_string(&self, cache: ObjRef, index: StringIndex) -> Result<()> {
        *self.state.write().get_mut(cache)?.string_slot_mut(cache, index)? = None;
        Ok(())
    }
}
