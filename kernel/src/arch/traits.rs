/// Architecture-independent trait for platform-specific operations
pub trait Architecture {
    /// Perform early architecture initialization (before the heap exists)
    fn early_init();

    /// Perform full architecture initialization
    fn init();

    /// Enable interrupts
    fn enable_interrupts();

    /// Disable interrupts
    fn disable_interrupts();

    /// Check if interrupts are enabled
    fn are_interrupts_enabled() -> bool;

    /// Wait for an interrupt (halt until interrupt)
    fn wait_for_interrupt();

    /// Stop this CPU for good.
    fn halt() -> ! {
        loop {
            Self::wait_for_interrupt();
        }
    }
}
