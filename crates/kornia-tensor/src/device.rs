/// Device type enumeration for tensor allocation.
///
/// Represents the compute devices a tensor allocator can report. The device
/// decides which kernels run natively, see [`crate::backend::Capability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    /// CPU device
    #[default]
    Cpu,
    /// CUDA device with device ID
    Cuda {
        /// The CUDA device ID
        device_id: usize,
    },
    /// Metal device with device ID
    Metal {
        /// The Metal device ID
        device_id: usize,
    },
    /// Vulkan device with device ID
    Vulkan {
        /// The Vulkan device ID
        device_id: usize,
    },
}

impl Device {
    /// Returns the device type as a string.
    pub fn device_type(&self) -> &str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda { .. } => "cuda",
            Device::Metal { .. } => "metal",
            Device::Vulkan { .. } => "vulkan",
        }
    }

    /// Returns the device ID if applicable.
    pub fn device_id(&self) -> Option<usize> {
        match self {
            Device::Cpu => None,
            Device::Cuda { device_id }
            | Device::Metal { device_id }
            | Device::Vulkan { device_id } => Some(*device_id),
        }
    }

    /// Returns true if the device is CPU.
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }

    /// Returns true if the device is a GPU.
    pub fn is_gpu(&self) -> bool {
        !self.is_cpu()
    }

    /// Creates a CUDA device with the specified device ID.
    pub fn cuda(device_id: usize) -> Self {
        Device::Cuda { device_id }
    }

    /// Creates a Metal device with the specified device ID.
    pub fn metal(device_id: usize) -> Self {
        Device::Metal { device_id }
    }

    /// Creates a Vulkan device with the specified device ID.
    pub fn vulkan(device_id: usize) -> Self {
        Device::Vulkan { device_id }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.device_id() {
            None => write!(f, "{}", self.device_type()),
            Some(id) => write!(f, "{}:{}", self.device_type(), id),
        }
    }
}
