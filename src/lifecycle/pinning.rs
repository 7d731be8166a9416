//! Walks over the objects pinned by asynchronous-IO wrappers.
//!
//! A [`TypeKind::PinningWrapper`] object pins the objects its reference fields point to. A
//! pinned reference array also pins its elements. Hosts can implement
//! `walk_async_pinned_for_promotion` and `walk_async_pinned` with these functions.

use crate::roots::ScanContext;
use crate::util::ObjectReference;
use crate::vm::object_model::{self, TypeKind};
use crate::vm::{RootFlags, RootVisitor};

/// # Safety
/// `object` and the objects it references must be initialized.
unsafe fn is_wrapper(object: ObjectReference) -> bool {
    object_model::type_of(object).kind == TypeKind::PinningWrapper
}

/// Report every pinned target of `wrapper`, and every element of a pinned reference array, as
/// a pinned root. Does nothing if `wrapper` is not a pinning wrapper.
///
/// # Safety
/// `wrapper` and the objects it references must be initialized, and the execution engine must
/// be suspended.
pub unsafe fn walk_async_pinned_for_promotion(
    wrapper: ObjectReference,
    sc: &ScanContext,
    visitor: &mut dyn RootVisitor,
) {
    if !is_wrapper(wrapper) {
        return;
    }
    object_model::for_each_reference_slot(wrapper, |slot| {
        let target: &mut ObjectReference = &mut *slot.to_mut_ptr();
        if target.is_null() {
            return;
        }
        let array = *target;
        visitor.visit_root(target, sc, RootFlags::PINNED);
        if object_model::type_of(array).kind == TypeKind::ReferenceArray {
            object_model::for_each_reference_slot(array, |element_slot| {
                let element: &mut ObjectReference = &mut *element_slot.to_mut_ptr();
                if !element.is_null() {
                    visitor.visit_root(element, sc, RootFlags::PINNED);
                }
            });
        }
    });
}

/// Call `callback(wrapper, pinned)` for every object pinned by `wrapper`: each target that is
/// not a reference array, and each element of a target that is. Does nothing if `wrapper` is
/// not a pinning wrapper.
///
/// # Safety
/// `wrapper` and the objects it references must be initialized.
pub unsafe fn walk_async_pinned(
    wrapper: ObjectReference,
    callback: &mut dyn FnMut(ObjectReference, ObjectReference),
) {
    if !is_wrapper(wrapper) {
        return;
    }
    object_model::for_each_reference(wrapper, |target| {
        if object_model::type_of(target).kind == TypeKind::ReferenceArray {
            object_model::for_each_reference(target, |element| callback(wrapper, element));
        } else {
            callback(wrapper, target);
        }
    });
}
