/// CPU services the scheduler relies on.
///
/// All functions act on the CPU executing them.
pub trait Arch {
    /// Index of the executing CPU, `0..nr_cpus()`.
    fn cpu_id() -> usize;

    /// Number of CPUs that are online or will be brought online.
    fn nr_cpus() -> usize;

    /// Mask local interrupts and return the previous mask state.
    fn irq_save() -> u64;

    /// Restore a mask state returned by [`Arch::irq_save`].
    fn irq_restore(saved: u64);

    /// Enter the scheduler synchronously, as if a tick had fired. Returns
    /// once this task is picked again.
    fn yield_trap();

    /// Address a task returns into when its entry function returns.
    fn exit_trampoline() -> u64;

    /// Interrupt `cpu` so it reschedules and sees newly woken tasks.
    fn send_reschedule(cpu: usize);
}
