//! Per-operation diagnostic lines.
//!
//! Every backend entry point emits one fixed-width line:
//! `{tag:<25} {what} {dims} \t{backend:<5}`, at debug level under the
//! `hplgpu` target.

use hplgpu_core::DeviceProperties;

/// Log target for all backend diagnostics.
pub const TARGET: &str = "hplgpu";

/// Diagnostics sink bound to one backend name.
#[derive(Debug, Clone, Copy)]
pub struct Trace {
    backend: &'static str,
}

impl Trace {
    pub fn new(backend: &'static str) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Render one line without emitting it.
    pub fn format(&self, tag: &str, what: &str, dims: &str) -> String {
        format!("{:<25} {} {} \t{:<5}", tag, what, dims, self.backend)
    }

    pub fn op(&self, tag: &str, what: &str, dims: &str) {
        log::debug!(target: TARGET, "{}", self.format(tag, what, dims));
    }

    /// Trace a copy under the context's label for its direction.
    pub fn transfer(&self, label: &str, bytes: usize) {
        let tag = format!("[MOVE_{}]", label);
        self.op(&tag, "Memory transfer", &format!("{} bytes", bytes));
    }
}

/// The device summary logged at initialization, one row per property.
pub fn property_lines(props: &DeviceProperties) -> Vec<String> {
    let row = |tag: &str, value: String| format!("{:<15} {}", tag, value);
    vec![
        row("[Device]", props.name.clone()),
        row("[GlobalMem]", format!("{} bytes", props.total_global_mem)),
        row("[SharedMem]", format!("{} bytes", props.shared_mem_per_block)),
        row("[Regs]", props.regs_per_block.to_string()),
        row("[WarpSize]", props.warp_size.to_string()),
        row("[MaxThreads]", props.max_threads_per_block.to_string()),
        row(
            "[MaxThreadsDim]",
            format!(
                "{} {} {}",
                props.max_threads_dim[0], props.max_threads_dim[1], props.max_threads_dim[2]
            ),
        ),
        row(
            "[MaxGridSize]",
            format!(
                "{} {} {}",
                props.max_grid_size[0], props.max_grid_size[1], props.max_grid_size[2]
            ),
        ),
        row("[ConstMem]", format!("{} bytes", props.total_const_mem)),
        row("[Major]", props.major.to_string()),
        row("[Minor]", props.minor.to_string()),
        row("[ClkRate]", format!("{} kHz", props.memory_clock_rate)),
        row("[#CUs]", props.multiprocessor_count.to_string()),
        row("[PCIBusID]", props.pci_bus_id.to_string()),
        "-".repeat(40),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_line_is_fixed_width() {
        let trace = Trace::new("HOST");
        let line = trace.format("[DGEMM]", "General matrix multiply", "(4, 4, 4)");
        assert_eq!(line.find("General"), Some(26));
        assert!(line.starts_with("[DGEMM] "));
        assert!(line.ends_with("\tHOST "));
    }

    #[test]
    fn property_table_has_every_row() {
        let lines = property_lines(&DeviceProperties::default());
        assert_eq!(lines.len(), 15);
        assert!(lines[0].starts_with("[Device]"));
        assert!(lines[13].starts_with("[PCIBusID]"));
        assert!(lines[14].chars().all(|c| c == '-'));
    }
}
