//! Ctrl-C handling while downloads run

/// Exit status after a forced stop (128 + SIGINT)
pub const INTERRUPTED_EXIT_CODE: u8 = 130;

/// What the CLI does with a Ctrl-C
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Cancel the run and wait for tasks to report
    Cancel,
    /// Stop waiting and exit now
    Exit,
}

/// Interrupt counter: the first Ctrl-C cancels, any later one exits
#[derive(Debug, Default)]
pub struct Interrupts {
    count: usize,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one Ctrl-C and decide what to do about it
    pub fn record(&mut self) -> InterruptAction {
        self.count += 1;
        if self.count == 1 {
            InterruptAction::Cancel
        } else {
            InterruptAction::Exit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_interrupt_cancels() {
        let mut interrupts = Interrupts::new();
        assert_eq!(interrupts.record(), InterruptAction::Cancel);
    }

    #[test]
    fn test_repeated_interrupt_exits() {
        let mut interrupts = Interrupts::new();
        assert_eq!(interrupts.record(), InterruptAction::Cancel);
        assert_eq!(interrupts.record(), InterruptAction::Exit);
        assert_eq!(interrupts.record(), InterruptAction::Exit);
    }
}
