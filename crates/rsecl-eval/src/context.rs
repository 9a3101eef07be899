//! Per-evaluation state: the event and the quantifier registers.

/// Number of register slots in a [`Context`]; bounds how deeply
/// quantifiers may nest within a single rule.
pub const MAX_REGISTERS: usize = 32;

/// Register file threaded through one evaluation.
///
/// Each quantifier of a rule is assigned a slot at compile time; siblings may
/// share one, nested quantifiers never do. While the quantifier iterates, its
/// slot holds the index of the current element and every field bound to that
/// iterator reads that element.
///
/// A context is created per evaluation call and never shared between
/// threads or rules.
#[derive(Debug)]
pub struct Context<'a, E> {
    event: &'a E,
    registers: [Option<usize>; MAX_REGISTERS],
}

impl<'a, E> Context<'a, E> {
    pub fn new(event: &'a E) -> Self {
        Context {
            event,
            registers: [None; MAX_REGISTERS],
        }
    }

    pub fn event(&self) -> &'a E {
        self.event
    }

    /// Current element index held by `register`, `None` when unbound.
    pub fn register(&self, register: usize) -> Option<usize> {
        self.registers.get(register).copied().flatten()
    }

    /// Bind `register` to `index`, returning the previous binding.
    pub(crate) fn bind(&mut self, register: usize, index: Option<usize>) -> Option<usize> {
        match self.registers.get_mut(register) {
            Some(slot) => std::mem::replace(slot, index),
            None => None,
        }
    }

    /// Clear every register.
    pub fn reset(&mut self) {
        self.registers = [None; MAX_REGISTERS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_returns_previous() {
        let event = ();
        let mut ctx = Context::new(&event);
        assert_eq!(ctx.register(3), None);
        assert_eq!(ctx.bind(3, Some(7)), None);
        assert_eq!(ctx.register(3), Some(7));
        assert_eq!(ctx.bind(3, Some(8)), Some(7));
        ctx.reset();
        assert_eq!(ctx.register(3), None);
    }

    #[test]
    fn test_out_of_range_register_is_unbound() {
        let event = ();
        let mut ctx = Context::new(&event);
        assert_eq!(ctx.bind(MAX_REGISTERS, Some(1)), None);
        assert_eq!(ctx.register(MAX_REGISTERS), None);
    }
}
