use std::cell::RefCell;
use std::marker::PhantomData;
use storyline_recorder::Recorder;

thread_local! {
    static STACK: RefCell<Vec<Recorder>> = const { RefCell::new(Vec::new()) };
}

/// Make `recorder` current on this thread until the guard drops.
///
/// Scopes nest; dropping a guard restores whatever was current before it.
#[must_use = "the story is only current while the guard is alive"]
pub fn enter(recorder: Recorder) -> ScopeGuard {
    let depth = STACK.with_borrow_mut(|stack| {
        stack.push(recorder);
        stack.len() - 1
    });
    ScopeGuard {
        depth,
        _not_send: PhantomData,
    }
}

pub(crate) fn current() -> Option<Recorder> {
    STACK.with_borrow(|stack| stack.last().cloned())
}

/// Pops the thread scope on drop. Bound to the thread that created it.
pub struct ScopeGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        // Guards dropped out of order still leave the stack consistent.
        STACK.with_borrow_mut(|stack| stack.truncate(self.depth));
    }
}
