//! Periodic jobs running on the server reactor

use std::io;
use std::time::Duration;

use futures::{Future, Stream};
use tokio_core::reactor::{Handle, Interval};

use crate::controller::context::{DynamicContext, StaticContext};
use crate::repos::repo_factory::ReposFactory;
use crate::services::archive::ArchiveService;
use crate::services::Service;

/// Archives finished orders every `archive.interval_s`; a failed sweep is logged and the next tick runs anyway
pub fn start_auto_archive<F: ReposFactory>(handle: &Handle, static_context: StaticContext<F>) -> io::Result<()> {
    let interval_s = static_context.config.archive.interval_s;
    let threshold_hours = static_context.config.archive.threshold_hours;
    let interval = Interval::new(Duration::from_secs(interval_s.max(1)), handle)?;
    let ticks = interval
        .map_err(|e| error!("Auto-archive timer failed: {}", e))
        .for_each(move |_| {
            let service = Service::new(static_context.clone(), DynamicContext::new(None));
            service.auto_archive().then(|result| {
                match result {
                    Ok(report) => {
                        if report.delivered + report.canceled > 0 {
                            info!(
                                "Auto-archive archived {} delivered and {} canceled orders",
                                report.delivered, report.canceled
                            );
                        } else {
                            debug!("Auto-archive found nothing to archive");
                        }
                    }
                    Err(e) => warn!("Auto-archive sweep failed: {}", e),
                }
                Ok::<(), ()>(())
            })
        });
    handle.spawn(ticks);
    info!(
        "Auto-archive every {}s for orders finished more than {}h ago",
        interval_s, threshold_hours
    );
    Ok(())
}
