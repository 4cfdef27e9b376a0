use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::object::VMObject;

/// Registers available to a single frame.
pub const MAX_REGISTERS: usize = 32;

/// One call-stack activation.
///
/// Registers start as [`VMObject::None`]; indices past the frame's
/// register count fault with [`VMError::InvalidRegisterIndex`].
#[derive(Debug, Clone)]
pub struct ExecutionFrame {
    context: String,
    return_offset: usize,
    registers: Vec<VMObject>,
}

impl ExecutionFrame {
    pub fn new(context: &str, register_count: usize, return_offset: usize) -> Result<Self, VMError> {
        if register_count > MAX_REGISTERS {
            return Err(VMError::InvalidRegisterCount(register_count));
        }
        Ok(Self {
            context: context.to_string(),
            return_offset,
            registers: vec![VMObject::None; register_count],
        })
    }

    /// Name of the context that owns this frame.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Offset the caller resumes at once this frame returns.
    pub fn return_offset(&self) -> usize {
        self.return_offset
    }

    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    pub fn get(&self, idx: u8) -> Result<&VMObject, VMError> {
        self.registers
            .get(idx as usize)
            .ok_or(VMError::InvalidRegisterIndex(idx))
    }

    pub fn set(&mut self, idx: u8, value: VMObject) -> Result<(), VMError> {
        let slot = self
            .registers
            .get_mut(idx as usize)
            .ok_or(VMError::InvalidRegisterIndex(idx))?;
        *slot = value;
        Ok(())
    }

    /// Moves the value out of a register, leaving `None` behind.
    pub fn take(&mut self, idx: u8) -> Result<VMObject, VMError> {
        let slot = self
            .registers
            .get_mut(idx as usize)
            .ok_or(VMError::InvalidRegisterIndex(idx))?;
        Ok(std::mem::take(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_start_empty() {
        let frame = ExecutionFrame::new("entry", 4, 0).unwrap();
        assert_eq!(frame.register_count(), 4);
        assert!(frame.get(3).unwrap().is_none());
        assert!(matches!(frame.get(4), Err(VMError::InvalidRegisterIndex(4))));
    }

    #[test]
    fn register_count_is_bounded() {
        assert!(ExecutionFrame::new("entry", MAX_REGISTERS, 0).is_ok());
        assert!(matches!(
            ExecutionFrame::new("entry", MAX_REGISTERS + 1, 0),
            Err(VMError::InvalidRegisterCount(33))
        ));
    }

    #[test]
    fn take_leaves_none() {
        let mut frame = ExecutionFrame::new("entry", 2, 7).unwrap();
        frame.set(1, VMObject::from(5i64)).unwrap();
        assert_eq!(frame.take(1).unwrap(), VMObject::from(5i64));
        assert!(frame.get(1).unwrap().is_none());
        assert_eq!(frame.return_offset(), 7);
        assert_eq!(frame.context(), "entry");
    }
}
