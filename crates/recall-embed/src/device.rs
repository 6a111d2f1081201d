use candle_core::Device;
use tracing::info;

/// Prefer an accelerator when the crate was built with one, else CPU.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) { info!("embedding device: metal"); return dev; }
    }
    #[cfg(feature = "cuda")]
    {
        if let Ok(dev) = Device::new_cuda(0) { info!("embedding device: cuda"); return dev; }
    }
    info!("embedding device: cpu");
    Device::Cpu
}
