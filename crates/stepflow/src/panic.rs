//! Helpers for rendering panic payloads.

/// Extracts a panic payload into a human-readable message.
///
/// Attempts to downcast common primitives before falling back to an opaque
/// description that includes the payload [`TypeId`](std::any::TypeId).
///
/// # Examples
/// ```
/// use stepflow::panic_message;
///
/// let err = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
/// assert_eq!(panic_message(err.as_ref()), "boom");
/// ```
#[must_use]
pub fn panic_message(e: &(dyn std::any::Any + Send)) -> String {
    macro_rules! try_downcast {
        ($($ty:ty),* $(,)?) => {
            $(
                if let Some(val) = e.downcast_ref::<$ty>() {
                    return val.to_string();
                }
            )*
        };
    }

    try_downcast!(&str, String, i32, u32, i64, u64, isize, usize, f32, f64);
    format!(
        "binding panicked with an opaque payload (TypeId({:?}))",
        e.type_id()
    )
}
