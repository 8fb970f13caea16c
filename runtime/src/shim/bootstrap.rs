use std::rc::Rc;

use precomp::code::Parser;
use precomp::rebuild::payload::decode_data_url;
use tracing::info;

use crate::error::ShimError;
use crate::host::Runtime;
use crate::shim::Shim;

/// Install the shim from its bootstrap payload: decode and parse the
/// payload, then register the extension and its scheduler hook.
pub fn install(runtime: &mut Runtime, url: &str) -> Result<Rc<Shim>, ShimError> {
    if !runtime.capabilities().unsandboxed {
        return Err(ShimError::Sandboxed);
    }
    let document = decode_data_url(url).ok_or(ShimError::Payload)?;
    let bootstrap = Parser::new(document, 0).parse_bootstrap()?;

    let shim = Rc::new(Shim::new(bootstrap));
    runtime.register_extension(shim.clone())?;
    runtime.add_hook(shim.clone());
    banner(&shim);
    Ok(shim)
}

fn banner(shim: &Shim) {
    info!("🛠️ precomp v{}", shim.version());
    info!(
        helpers = shim.helper_count(),
        "compiled scripts run as resumable step sequences"
    );
}
