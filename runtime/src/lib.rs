pub mod error;
pub mod host;
pub mod shim;
pub mod value;

pub use error::{RuntimeError, ShimError};
pub use host::{Capabilities, Runtime};
pub use shim::Shim;
pub use value::Value;

use std::rc::Rc;

use precomp::{Project, SHIM_ID};
use tracing::info;

use crate::host::Clock;

/// Build a host for `project` and, when the program carries a bootstrap
/// payload, install the runtime shim from it.
pub fn load_project(project: &Project, capabilities: Capabilities) -> Result<Runtime, ShimError> {
    load_project_with_clock(project, capabilities, Rc::new(host::SystemClock::new()))
}

/// [`load_project`] with an explicit time source.
pub fn load_project_with_clock(
    project: &Project,
    capabilities: Capabilities,
    clock: Rc<dyn Clock>,
) -> Result<Runtime, ShimError> {
    let mut runtime = Runtime::with_clock(project, clock);
    runtime.set_capabilities(capabilities);
    match project.extension_urls.get(SHIM_ID) {
        Some(url) => {
            shim::install(&mut runtime, url)?;
        }
        None => info!("program has no precompiled code, running interpreted"),
    }
    Ok(runtime)
}
