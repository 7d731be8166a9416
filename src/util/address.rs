use atomic_traits::Atomic;
use bytemuck::NoUninit;

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::sync::atomic::Ordering;

use crate::util::conversions;

/// A size in bytes.
pub type ByteSize = usize;

/// A raw address in the address space shared by the collector and the host: a heap location,
/// a root slot, or one of the barrier tables.
///
/// Arithmetic is in bytes. Dereferencing is unsafe.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, Hash, PartialOrd, Ord, PartialEq, Default, NoUninit)]
pub struct Address(usize);

impl Add<ByteSize> for Address {
    type Output = Address;
    fn add(self, offset: ByteSize) -> Address {
        Address(self.0 + offset)
    }
}

impl AddAssign<ByteSize> for Address {
    fn add_assign(&mut self, offset: ByteSize) {
        self.0 += offset;
    }
}

impl Sub<ByteSize> for Address {
    type Output = Address;
    fn sub(self, offset: ByteSize) -> Address {
        Address(self.0 - offset)
    }
}

/// The distance from `other` up to `self`.
impl Sub<Address> for Address {
    type Output = ByteSize;
    fn sub(self, other: Address) -> ByteSize {
        debug_assert!(self.0 >= other.0, "{} is below {}", self, other);
        self.0 - other.0
    }
}

impl Address {
    pub const ZERO: Self = Address(0);

    pub fn from_ptr<T>(ptr: *const T) -> Address {
        Address(ptr as usize)
    }

    pub fn from_mut_ptr<T>(ptr: *mut T) -> Address {
        Address(ptr as usize)
    }

    /// # Safety
    /// The result may not point to anything. Only use this for fixed addresses, such as the
    /// heap bounds of a barrier installation or addresses in tests.
    pub const unsafe fn from_usize(raw: usize) -> Address {
        Address(raw)
    }

    /// Read a `T` at this address.
    ///
    /// # Safety
    /// The address must be valid for reads of an initialized `T`.
    pub unsafe fn load<T: Copy>(self) -> T {
        *(self.0 as *const T)
    }

    /// Write `value` at this address without dropping the previous contents.
    ///
    /// # Safety
    /// The address must be valid for writes of `T`.
    pub unsafe fn store<T>(self, value: T) {
        (self.0 as *mut T).write(value);
    }

    /// Atomically store through the atomic type `T` located at this address.
    ///
    /// # Safety
    /// The address must be valid and aligned for `T`.
    pub unsafe fn atomic_store<T: Atomic>(self, val: T::Type, order: Ordering) {
        let loc = &*(self.0 as *const T);
        loc.store(val, order)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn align_up(self, align: ByteSize) -> Address {
        Address(conversions::raw_align_up(self.0, align))
    }

    pub const fn is_aligned_to(self, align: usize) -> bool {
        conversions::raw_is_aligned(self.0, align)
    }

    pub fn to_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Is this address inside `[start, end)`?
    pub fn is_in(self, start: Address, end: Address) -> bool {
        self >= start && self < end
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A reference to a managed object: the address of its first word, which points to the
/// object's [`crate::vm::TypeDescriptor`]. Null is zero.
///
/// Root slots and reference fields hold values of this type. It supports no arithmetic.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, Hash, PartialOrd, Ord, PartialEq, Default, NoUninit)]
pub struct ObjectReference(usize);

impl ObjectReference {
    pub const NULL: ObjectReference = ObjectReference(0);

    pub fn to_raw_address(self) -> Address {
        Address(self.0)
    }

    /// The reference to the object that starts at `addr`.
    pub fn from_raw_address(addr: Address) -> ObjectReference {
        ObjectReference(addr.0)
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn value(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
