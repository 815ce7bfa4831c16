//! Background install pass with panic isolation.

use crate::context::ShieldContext;
use crate::groups::HookGroup;
use crate::orchestrator::InstallReport;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

/// Run one install pass on a named background thread
///
/// Startup is not blocked on scanning. The handle yields `None` if the pass
/// panicked outside the per-method isolation; callers may join or detach.
pub fn spawn_install_pass(
    ctx: Arc<ShieldContext>,
    groups: Vec<HookGroup>,
) -> io::Result<thread::JoinHandle<Option<InstallReport>>> {
    thread::Builder::new()
        .name(format!("install-pass-{}", ctx.host_package()))
        .spawn(move || {
            info!("Install worker for {} started", ctx.host_package());
            let result = panic::catch_unwind(AssertUnwindSafe(|| ctx.install(&groups)));
            match result {
                Ok(report) => {
                    info!("Install worker for {} finished", ctx.host_package());
                    Some(report)
                }
                Err(panic_info) => {
                    let error_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    error!("Install worker for {} panicked: {}", ctx.host_package(), error_msg);
                    None
                }
            }
        })
}
