//! Manual FFI bindings for the kinematic_tree library
//!
//! A C-compatible interface for C and C++ consumers that need forward
//! kinematics and Jacobians every tick without linking a Rust toolchain into
//! their build.
//!
//! The approach uses:
//! - `#[unsafe(no_mangle)]` functions with C calling convention
//! - An opaque handle owning the tree, created and freed through this API
//! - Column-major matrices (Eigen's default layout)
//! - `bool`/count return values instead of unwinding across the boundary

use kinematic_tree::{Frame, JointKind, KinematicTree, Matrix4, Pose, Vector3};
use std::ffi::{CStr, c_char, c_double, c_uint};
use std::ptr;

/// Opaque handle to a Rust KinematicTree
pub struct KinematicTreeHandle {
    tree: KinematicTree,
}

/// C-compatible representation of a 4x4 homogeneous transform
/// Data is stored in column-major order (compatible with Eigen)
#[repr(C)]
pub struct Mat4d {
    pub data: [c_double; 16],
}

impl Mat4d {
    fn identity() -> Self {
        Self::from(&Pose::identity())
    }
}

impl From<&Pose> for Mat4d {
    fn from(pose: &Pose) -> Self {
        Self {
            data: pose.to_column_major(),
        }
    }
}

fn as_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(s) }.to_str().ok()
}

/// Create an empty tree holding only the root frame `"spatial"`
///
/// # Safety
/// The returned pointer must be freed using `kinematic_tree_free`
#[unsafe(no_mangle)]
pub extern "C" fn kinematic_tree_new() -> *mut KinematicTreeHandle {
    let handle = KinematicTreeHandle {
        tree: KinematicTree::new(),
    };
    Box::into_raw(Box::new(handle))
}

/// Load a tree from a URDF file
///
/// Returns null if the path is null, not UTF-8, unreadable or not a valid
/// robot description.
///
/// # Safety
/// The returned pointer must be freed using `kinematic_tree_free`
/// The path pointer must be valid and null-terminated
#[unsafe(no_mangle)]
pub extern "C" fn kinematic_tree_from_urdf(path: *const c_char) -> *mut KinematicTreeHandle {
    let Some(path) = as_str(path) else {
        return ptr::null_mut();
    };
    match kinematic_tree_urdf::load_file(path) {
        Ok(tree) => Box::into_raw(Box::new(KinematicTreeHandle { tree })),
        Err(_) => ptr::null_mut(),
    }
}

/// Free a tree handle
///
/// # Safety
/// The pointer must be a valid pointer returned from `kinematic_tree_new` or
/// `kinematic_tree_from_urdf` and must not be used after this call
#[unsafe(no_mangle)]
pub extern "C" fn kinematic_tree_free(tree: *mut KinematicTreeHandle) {
    if !tree.is_null() {
        unsafe {
            drop(Box::from_raw(tree));
        }
    }
}

/// Add a frame under `parent` (the root when null)
///
/// `kind` is one of `fixed`, `rotate_x`, `rotate_y`, `rotate_z`,
/// `translate_x`, `translate_y`, `translate_z`. For `fixed` frames `pose`
/// gives the constant transform from the parent (identity when null); it is
/// ignored for joints. Returns false if any argument is invalid, the name is
/// taken or the parent is unknown.
///
/// # Safety
/// tree must be valid, strings must be null-terminated, pose must be null or
/// point to a `Mat4d`
#[unsafe(no_mangle)]
pub extern "C" fn kinematic_tree_add_frame(
    tree: *mut KinematicTreeHandle,
    name: *const c_char,
    parent: *const c_char,
    kind: *const c_char,
    pose: *const Mat4d,
) -> bool {
    if tree.is_null() {
        return false;
    }
    let (Some(name), Some(kind)) = (as_str(name), as_str(kind)) else {
        return false;
    };
    let Ok(kind) = kind.parse::<JointKind>() else {
        return false;
    };
    let parent = if parent.is_null() {
        None
    } else {
        match as_str(parent) {
            Some(parent) => Some(parent),
            None => return false,
        }
    };

    let frame = if kind.is_fixed() {
        let pose = if pose.is_null() {
            Pose::identity()
        } else {
            let data = unsafe { &(*pose).data };
            match Pose::try_from_matrix(Matrix4::from_column_slice(data)) {
                Ok(pose) => pose,
                Err(_) => return false,
            }
        };
        Frame::fixed(pose)
    } else {
        Frame::joint(kind)
    };

    let handle = unsafe { &mut *tree };
    handle.tree.add_frame(name, |_| frame, parent).is_ok()
}

/// Number of generalized coordinates
#[unsafe(no_mangle)]
pub extern "C" fn kinematic_tree_dof(tree: *const KinematicTreeHandle) -> c_uint {
    if tree.is_null() {
        return 0;
    }

    let handle = unsafe { &*tree };
    handle.tree.dof() as c_uint
}

/// Set every coordinate and update the tree
///
/// Returns false (assigning nothing) unless `size` equals the DOF count.
///
/// # Safety
/// - tree pointer must be valid
/// - coordinates must point to at least `size` elements
#[unsafe(no_mangle)]
pub extern "C" fn kinematic_tree_set_coordinates(
    tree: *mut KinematicTreeHandle,
    coordinates: *const c_double,
    size: c_uint,
) -> bool {
    if tree.is_null() || (coordinates.is_null() && size > 0) {
        return false;
    }

    let handle = unsafe { &mut *tree };
    let coordinates: &[f64] = if size == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(coordinates, size as usize) }
    };
    handle.tree.set_coordinates(coordinates).is_ok()
}

/// Copy up to `size` coordinates into `out`, returning how many were written
///
/// # Safety
/// - tree pointer must be valid
/// - out must point to at least `size` writable elements
#[unsafe(no_mangle)]
pub extern "C" fn kinematic_tree_get_coordinates(
    tree: *const KinematicTreeHandle,
    out: *mut c_double,
    size: c_uint,
) -> c_uint {
    if tree.is_null() || out.is_null() {
        return 0;
    }

    let handle = unsafe { &*tree };
    let coordinates = handle.tree.coordinates();
    let count = coordinates.len().min(size as usize);
    let out = unsafe { std::slice::from_raw_parts_mut(out, count) };
    out.copy_from_slice(&coordinates[..count]);
    count as c_uint
}

/// Refresh every frame's world state
#[unsafe(no_mangle)]
pub extern "C" fn kinematic_tree_update(tree: *mut KinematicTreeHandle) {
    if tree.is_null() {
        return;
    }

    let handle = unsafe { &mut *tree };
    handle.tree.update();
}

/// World pose of a frame
///
/// On failure `out` is set to the identity and false is returned.
///
/// # Safety
/// tree pointer must be valid, name must be null-terminated and out must be
/// a valid pointer
#[unsafe(no_mangle)]
pub extern "C" fn kinematic_tree_get_world_pose(
    tree: *const KinematicTreeHandle,
    name: *const c_char,
    out: *mut Mat4d,
) -> bool {
    if out.is_null() {
        return false;
    }
    let out = unsafe { &mut *out };
    *out = Mat4d::identity();

    if tree.is_null() {
        return false;
    }
    let Some(name) = as_str(name) else {
        return false;
    };

    let handle = unsafe { &*tree };
    match handle.tree.world_pose(name) {
        Ok(pose) => {
            *out = Mat4d::from(&pose);
            true
        }
        Err(_) => false,
    }
}

/// World-frame Jacobian of a frame as a 6×DOF column-major matrix
///
/// Rows are `[vx, vy, vz, wx, wy, wz]`. When `point` is non-null it holds a
/// point in the frame's own coordinates whose linear velocity is reported
/// instead of the frame origin's.
///
/// # Safety
/// - tree pointer must be valid and name null-terminated
/// - point must be null or point to 3 elements
/// - out must point to at least `size` writable elements, `size >= 6 * dof`
#[unsafe(no_mangle)]
pub extern "C" fn kinematic_tree_get_jacobian(
    tree: *const KinematicTreeHandle,
    name: *const c_char,
    point: *const c_double,
    out: *mut c_double,
    size: c_uint,
) -> bool {
    if tree.is_null() || out.is_null() {
        return false;
    }
    let Some(name) = as_str(name) else {
        return false;
    };

    let handle = unsafe { &*tree };
    let needed = 6 * handle.tree.dof();
    if (size as usize) < needed {
        return false;
    }

    let point = if point.is_null() {
        None
    } else {
        let p = unsafe { std::slice::from_raw_parts(point, 3) };
        Some(Vector3::new(p[0], p[1], p[2]))
    };

    match handle.tree.jacobian(name, point.as_ref()) {
        Ok(jacobian) => {
            let out = unsafe { std::slice::from_raw_parts_mut(out, needed) };
            out.copy_from_slice(jacobian.as_slice());
            true
        }
        Err(_) => false,
    }
}
