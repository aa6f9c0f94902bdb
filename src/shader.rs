//! Shader resources compiled into the library, addressed by name.

use crate::error::{CrtError, CrtResult};

/// Resource name of the CRT pixel shader
pub const CRT: &str = "crt.wgsl";

/// Every shader embedded in the binary
const RESOURCES: &[(&str, &str)] = &[(CRT, include_str!("../shader/crt.wgsl"))];

/// Looks up the source of an embedded shader
pub fn load(name: &str) -> CrtResult<&'static str> {
    let source = RESOURCES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, src)| *src)
        .ok_or_else(|| CrtError::resource_load(name, "no such shader resource"))?;
    if source.trim().is_empty() {
        return Err(CrtError::resource_load(name, "shader resource is empty"));
    }
    log::trace!("Loaded shader resource {:?} ({} bytes)", name, source.len());
    Ok(source)
}
