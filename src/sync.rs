#[cfg(feature = "sync")]
pub(crate) use spin::{Mutex, MutexGuard as Guard};

#[cfg(not(feature = "sync"))]
pub(crate) type Guard<'a, T> = core::cell::RefMut<'a, T>;

#[cfg(feature = "sync")]
pub(crate) type Shared<T> = alloc::sync::Arc<Mutex<T>>;
#[cfg(not(feature = "sync"))]
pub(crate) type Shared<T> = alloc::rc::Rc<core::cell::RefCell<T>>;

pub(crate) fn shared<T>(t: T) -> Shared<T> {
    match () {
        #[cfg(feature = "sync")]
        () => alloc::sync::Arc::new(Mutex::new(t)),
        #[cfg(not(feature = "sync"))]
        () => alloc::rc::Rc::new(core::cell::RefCell::new(t)),
    }
}

/// Try to take the volume gate, giving up after `budget` attempts
///
/// Without the `sync` feature the gate is taken at once or not at all, `budget` is unused.
pub(crate) fn try_acquire<T>(shared: &Shared<T>, budget: u32) -> Option<Guard<'_, T>> {
    match () {
        #[cfg(feature = "sync")]
        () => {
            for _ in 0..=budget {
                if let Some(guard) = shared.try_lock() {
                    return Some(guard);
                }
                core::hint::spin_loop();
            }
            None
        }
        #[cfg(not(feature = "sync"))]
        () => {
            let _ = budget;
            shared.try_borrow_mut().ok()
        }
    }
}

pub(crate) fn try_unwrap<T>(shared: Shared<T>) -> Result<T, Shared<T>> {
    match () {
        #[cfg(feature = "sync")]
        () => alloc::sync::Arc::try_unwrap(shared).map(|mutex| mutex.into_inner()),
        #[cfg(not(feature = "sync"))]
        () => alloc::rc::Rc::try_unwrap(shared).map(|cell| cell.into_inner()),
    }
}

/// Acquire the gate or return `Timeout` from the enclosing function
macro_rules! acquire {
    ($shared: expr, $budget: expr) => {
        match $crate::sync::try_acquire(&$shared, $budget) {
            Some(guard) => guard,
            None => {
                warn!("Volume gate not acquired within {} attempts", $budget);
                return Err($crate::error::OperationError::Timeout.into());
            }
        }
    };
}

pub(crate) use acquire;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_gate_timeout() {
        let gate = shared(0u32);
        let guard = try_acquire(&gate, 3).unwrap();
        assert!(try_acquire(&gate, 3).is_none());
        drop(guard);
        *try_acquire(&gate, 3).unwrap() += 1;
        assert_eq!(try_unwrap(gate).ok(), Some(1));
    }
}
