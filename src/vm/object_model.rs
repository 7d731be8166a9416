//! The object layout shared by the collector and the host.
//!
//! Every object starts with a pointer to its [`TypeDescriptor`] (the "method table").
//! Arrays, and the free objects used as filler, additionally store a component count in
//! the second word. The size of an object is `base_size + component_size * num_components`,
//! rounded up to a word.
//!
//! The free-object descriptor is an array type with one-byte components, so a gap of any
//! word-aligned size of at least [`MIN_OBJECT_SIZE`] bytes can be turned into a single
//! free object, and a heap walker can always skip it.

use crate::util::constants::{BYTES_IN_WORD, MIN_OBJECT_SIZE};
use crate::util::conversions;
use crate::util::{Address, ObjectReference};

use memoffset::offset_of;
use static_assertions::const_assert_eq;

/// The shape of objects described by a [`TypeDescriptor`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    /// A plain object with reference fields at fixed offsets.
    Object,
    /// An array whose components are object references.
    ReferenceArray,
    /// An array whose components contain no references.
    PrimitiveArray,
    /// Filler used to keep the heap walkable.
    Free,
    /// An object that pins the objects referenced by its fields, such as the
    /// overlapped-IO buffers of asynchronous operations.
    PinningWrapper,
}

/// The host's description of a type. The first word of every object points to one of these.
#[derive(Debug)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub kind: TypeKind,
    /// Size of an instance without components, including the header.
    pub base_size: usize,
    /// Size of one component. Zero for non-array types.
    pub component_size: usize,
    /// Offsets (from the object start) of the reference fields of non-array types.
    pub reference_offsets: &'static [usize],
    pub has_finalizer: bool,
}

impl TypeDescriptor {
    /// The descriptor a host should hand out from `get_free_object_method_table`.
    pub const FREE: TypeDescriptor = TypeDescriptor {
        name: "Free",
        kind: TypeKind::Free,
        base_size: MIN_OBJECT_SIZE,
        component_size: 1,
        reference_offsets: &[],
        has_finalizer: false,
    };

    pub fn is_array(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::ReferenceArray | TypeKind::PrimitiveArray | TypeKind::Free
        )
    }

    pub fn is_free(&self) -> bool {
        self.kind == TypeKind::Free
    }

    /// The size of an instance with the given number of components.
    pub fn instance_size(&self, num_components: usize) -> usize {
        conversions::align_up_to_word(self.base_size + self.component_size * num_components)
    }
}

#[repr(C)]
struct ObjectHeader {
    type_descriptor: *const TypeDescriptor,
}

#[repr(C)]
struct ArrayHeader {
    header: ObjectHeader,
    num_components: usize,
}

const TYPE_DESCRIPTOR_OFFSET: usize = offset_of!(ObjectHeader, type_descriptor);
const NUM_COMPONENTS_OFFSET: usize = offset_of!(ArrayHeader, num_components);

const_assert_eq!(TYPE_DESCRIPTOR_OFFSET, 0);
const_assert_eq!(NUM_COMPONENTS_OFFSET, BYTES_IN_WORD);
const_assert_eq!(std::mem::size_of::<ArrayHeader>(), MIN_OBJECT_SIZE);

/// Write the header of a new object at `start` and return the reference to it.
///
/// # Safety
/// `start` must point to writable memory of at least `ty.instance_size(num_components)` bytes.
pub unsafe fn initialize_object(
    start: Address,
    ty: &'static TypeDescriptor,
    num_components: usize,
) -> ObjectReference {
    debug_assert!(start.is_aligned_to(BYTES_IN_WORD));
    (start + TYPE_DESCRIPTOR_OFFSET).store(ty as *const TypeDescriptor);
    if ty.is_array() {
        (start + NUM_COMPONENTS_OFFSET).store(num_components);
    } else {
        debug_assert_eq!(num_components, 0, "{} is not an array type", ty.name);
    }
    ObjectReference::from_raw_address(start)
}

/// Get the type descriptor of an object.
///
/// # Safety
/// `object` must refer to an initialized object.
pub unsafe fn type_of<'a>(object: ObjectReference) -> &'a TypeDescriptor {
    let ptr: *const TypeDescriptor = (object.to_raw_address() + TYPE_DESCRIPTOR_OFFSET).load();
    &*ptr
}

/// Get the number of components of an object. Non-array objects have none.
///
/// # Safety
/// `object` must refer to an initialized object.
pub unsafe fn num_components(object: ObjectReference) -> usize {
    if type_of(object).is_array() {
        (object.to_raw_address() + NUM_COMPONENTS_OFFSET).load()
    } else {
        0
    }
}

/// # Safety
/// `object` must refer to an initialized object.
pub unsafe fn object_size(object: ObjectReference) -> usize {
    type_of(object).instance_size(num_components(object))
}

/// Turn `[start, start + bytes)` into one free object described by `free_type`.
///
/// # Safety
/// The range must be writable and must not overlap any live object.
pub unsafe fn fill_with_free_object(start: Address, bytes: usize, free_type: &'static TypeDescriptor) {
    assert!(free_type.is_free());
    assert!(
        bytes >= MIN_OBJECT_SIZE,
        "cannot fill a gap of {} bytes at {}",
        bytes,
        start
    );
    debug_assert!(conversions::raw_is_aligned(bytes, BYTES_IN_WORD));
    let num_components = (bytes - free_type.base_size) / free_type.component_size;
    let object = initialize_object(start, free_type, num_components);
    debug_assert_eq!(object_size(object), bytes);
}

/// Visit the address of every reference slot of an object.
///
/// # Safety
/// `object` must refer to an initialized object.
pub unsafe fn for_each_reference_slot<F: FnMut(Address)>(object: ObjectReference, mut f: F) {
    let ty = type_of(object);
    let start = object.to_raw_address();
    match ty.kind {
        TypeKind::Object | TypeKind::PinningWrapper => {
            for offset in ty.reference_offsets {
                f(start + *offset);
            }
        }
        TypeKind::ReferenceArray => {
            let elements = start + ty.base_size;
            for i in 0..num_components(object) {
                f(elements + i * BYTES_IN_WORD);
            }
        }
        TypeKind::PrimitiveArray | TypeKind::Free => {}
    }
}

/// Visit the non-null references held by an object.
///
/// # Safety
/// `object` must refer to an initialized object.
pub unsafe fn for_each_reference<F: FnMut(ObjectReference)>(object: ObjectReference, mut f: F) {
    for_each_reference_slot(object, |slot| {
        let target: ObjectReference = slot.load();
        if !target.is_null() {
            f(target);
        }
    })
}

/// Walk the objects in `[start, end)` in address order, skipping free objects.
///
/// # Safety
/// The range must be fully covered by initialized objects, for example an allocation buffer
/// whose unused tail has been retired.
pub unsafe fn walk_objects<F: FnMut(ObjectReference)>(start: Address, end: Address, mut f: F) {
    let mut cursor = start;
    while cursor < end {
        let object = ObjectReference::from_raw_address(cursor);
        let size = object_size(object);
        assert!(size >= MIN_OBJECT_SIZE, "heap corrupted at {}", cursor);
        if !type_of(object).is_free() {
            f(object);
        }
        cursor += size;
    }
    debug_assert_eq!(cursor, end);
}
